//! Import configuration.
//!
//! # Responsibility
//! - Load YAML configuration with a `base` section and named profiles.
//! - Provide tag vocabularies, field limits, storage and logging settings.
//!
//! # Invariants
//! - Profile values override `base` key by key; nested maps merge, scalars
//!   and lists replace.
//! - A loaded config has passed `validate()`.

use crate::classify::TagVocabulary;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const BASE_SECTION: &str = "base";

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration loading/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Yaml(serde_yaml::Error),
    UnknownProfile(String),
    Validation(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Yaml(err) => write!(f, "invalid config yaml: {err}"),
            Self::UnknownProfile(name) => write!(f, "config profile `{name}` not found"),
            Self::Validation(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Yaml(err) => Some(err),
            Self::UnknownProfile(_) | Self::Validation(_) => None,
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Yaml(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/database/notes_data.db"),
        }
    }
}

/// Maximum stored lengths, in characters (bytes for `image_data`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldLimits {
    pub title: usize,
    pub tag_name: usize,
    pub body_text: usize,
    pub image_filename: usize,
    pub image_data: usize,
}

impl Default for FieldLimits {
    fn default() -> Self {
        Self {
            title: 200,
            tag_name: 50,
            body_text: 100_000,
            image_filename: 200,
            image_data: 20_000_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    #[serde(rename = "where")]
    pub where_tags: Vec<String>,
    #[serde(rename = "when")]
    pub when_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub folder: PathBuf,
    /// When false, resources are stored in the database only.
    pub write_files: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("data/images"),
            write_files: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rotating log files; `None` disables file logs.
    pub dir: Option<PathBuf>,
    /// Duplicate records to stderr.
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            dir: None,
            console: true,
        }
    }
}

/// Full importer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub database: DatabaseConfig,
    pub limits: FieldLimits,
    pub tags: TagConfig,
    pub images: ImageConfig,
    pub logging: LoggingConfig,
}

impl ImportConfig {
    /// Loads and validates a YAML config file.
    pub fn from_file(path: impl AsRef<Path>, profile: Option<&str>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text, profile)
    }

    /// Parses and validates YAML text.
    ///
    /// A document without a `base` key is taken as the base section itself.
    pub fn from_yaml_str(text: &str, profile: Option<&str>) -> ConfigResult<Self> {
        let document: Value = serde_yaml::from_str(text)?;
        let mut sections = match document {
            Value::Mapping(mapping) => mapping,
            Value::Null => Mapping::new(),
            _ => {
                return Err(ConfigError::Validation(
                    "top-level config must be a mapping".to_string(),
                ))
            }
        };

        let mut merged = match sections.remove(BASE_SECTION) {
            Some(base) => base,
            None if profile.is_none() => Value::Mapping(sections.clone()),
            None => Value::Mapping(Mapping::new()),
        };

        if let Some(name) = profile {
            let overlay = sections
                .remove(name)
                .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))?;
            merge_values(&mut merged, overlay);
        }

        let config: ImportConfig = match merged {
            Value::Null => ImportConfig::default(),
            value => serde_yaml::from_value(value)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let limits = [
            ("title", self.limits.title),
            ("tag_name", self.limits.tag_name),
            ("body_text", self.limits.body_text),
            ("image_filename", self.limits.image_filename),
            ("image_data", self.limits.image_data),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(ConfigError::Validation(format!(
                    "limits.{name} must be greater than zero"
                )));
            }
        }

        crate::logging::normalize_level(&self.logging.level).map_err(ConfigError::Validation)?;

        if let Some(dir) = self.logging.dir.as_ref() {
            if !dir.is_absolute() {
                return Err(ConfigError::Validation(format!(
                    "logging.dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    /// Builds the normalized tag vocabulary used by the classifier.
    pub fn vocabulary(&self) -> TagVocabulary {
        TagVocabulary::new(&self.tags.where_tags, &self.tags.when_tags)
    }
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
