//! Import store: connection setup and schema versioning.
//!
//! `open_db` is the only way repositories get a connection. It prepares the
//! directory, sets the pragmas the upsert paths need and brings the schema
//! to the version this binary was built with.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version` and only moves forward.
//! - A failed migration leaves the previous version in place.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod migrations;
mod open;

pub use migrations::schema_version;
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failures while opening or migrating the import store.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The directory meant to hold the database file could not be created.
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A numbered migration script failed; nothing from the pass is kept.
    Migration {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
    /// The file was written by a newer build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::CreateDir { path, source } => {
                write!(f, "cannot create database directory {}: {source}", path.display())
            }
            Self::Migration {
                version,
                name,
                source,
            } => write!(f, "migration {version:04}_{name} failed: {source}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::CreateDir { source, .. } => Some(source),
            Self::Migration { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
