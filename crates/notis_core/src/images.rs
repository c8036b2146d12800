//! Attachment decoding and image file export.
//!
//! # Responsibility
//! - Turn a raw `<resource>` into a hashed `Resource`.
//! - Write image payloads as `<original-base>_<hash>.<ext>` files.
//!
//! # Invariants
//! - Only payloads whose magic bytes identify an image are accepted.
//! - File names never escape the configured folder.
//! - Existing files are left untouched, so re-imports write nothing new.

use crate::config::FieldLimits;
use crate::enex::RawResource;
use crate::model::resource::Resource;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Per-resource failures. None of these abort an import.
#[derive(Debug)]
pub enum ImageError {
    /// Required sub-field (`data`, `mime`) absent or blank.
    MissingField(&'static str),
    InvalidBase64(String),
    /// Decoded bytes are not a recognizable image.
    Unidentified { declared_mime: String },
    TooLarge { bytes: usize, limit: usize },
    Io(std::io::Error),
}

impl Display for ImageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "resource is missing `{field}`"),
            Self::InvalidBase64(message) => write!(f, "resource data is not base64: {message}"),
            Self::Unidentified { declared_mime } => {
                write!(f, "resource data is not an image (declared `{declared_mime}`)")
            }
            Self::TooLarge { bytes, limit } => {
                write!(f, "resource data is {bytes} bytes, limit is {limit}")
            }
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ImageError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Decodes and validates one raw resource.
pub fn decode_resource(raw: &RawResource, limits: &FieldLimits) -> Result<Resource, ImageError> {
    let data = non_blank(raw.data.as_deref()).ok_or(ImageError::MissingField("data"))?;
    let mime = non_blank(raw.mime.as_deref()).ok_or(ImageError::MissingField("mime"))?;

    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = BASE64
        .decode(compact.as_bytes())
        .map_err(|err| ImageError::InvalidBase64(err.to_string()))?;
    if bytes.len() > limits.image_data {
        return Err(ImageError::TooLarge {
            bytes: bytes.len(),
            limit: limits.image_data,
        });
    }

    let kind = infer::get(&bytes)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
        .ok_or_else(|| ImageError::Unidentified {
            declared_mime: mime.to_string(),
        })?;
    if kind.mime_type() != mime {
        debug!(
            "event=resource_decode module=images status=mime_mismatch declared={} detected={}",
            mime,
            kind.mime_type()
        );
    }

    let mut resource = Resource::from_bytes(String::new(), mime, bytes);
    let file_name = match non_blank(raw.file_name.as_deref()) {
        Some(name) => name.to_string(),
        None => format!("{}.{}", resource.hash, mime_subtype(mime, kind.extension())),
    };
    resource.file_name = file_name.chars().take(limits.image_filename).collect();
    resource.width = parse_dimension(raw.width.as_deref());
    resource.height = parse_dimension(raw.height.as_deref());
    Ok(resource)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn mime_subtype<'a>(mime: &'a str, fallback: &'a str) -> &'a str {
    mime.split_once('/')
        .map(|(_, subtype)| subtype)
        .filter(|subtype| !subtype.is_empty())
        .unwrap_or(fallback)
}

fn parse_dimension(value: Option<&str>) -> Option<u32> {
    non_blank(value).and_then(|value| value.parse().ok())
}

/// Writes image resources into one folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageStore {
    folder: PathBuf,
}

impl ImageStore {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Target path for `resource` inside the store folder.
    pub fn path_for(&self, resource: &Resource) -> PathBuf {
        self.folder.join(export_file_name(resource))
    }

    /// Writes `resource` unless its file already exists.
    ///
    /// Returns `Some(path)` when a file was written, `None` when skipped.
    pub fn save(&self, resource: &Resource) -> Result<Option<PathBuf>, ImageError> {
        let path = self.path_for(resource);
        if path.exists() {
            return Ok(None);
        }
        std::fs::create_dir_all(&self.folder)?;
        std::fs::write(&path, &resource.data)?;
        Ok(Some(path))
    }
}

/// `<original-base>_<hash>.<ext>`, reduced to a bare file name.
pub fn export_file_name(resource: &Resource) -> String {
    let bare = Path::new(&resource.file_name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let bare = Path::new(&bare);

    let base = bare
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = bare
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| {
            infer::get(&resource.data)
                .map(|kind| kind.extension().to_string())
                .unwrap_or_else(|| "bin".to_string())
        });

    if base.is_empty() || base == resource.hash {
        format!("{}.{ext}", resource.hash)
    } else {
        format!("{base}_{}.{ext}", resource.hash)
    }
}
