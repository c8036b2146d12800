//! Evernote `.enex` export parsing.
//!
//! # Responsibility
//! - Walk the export XML and collect raw per-note field values.
//! - Normalize embedded note HTML and derive titles for untitled notes.
//! - Parse Evernote timestamps.
//!
//! # Invariants
//! - Reading never touches the database; raw records are transient.
//! - A missing export file or malformed XML is fatal, everything inside a
//!   well-formed note is best effort.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod content;
pub mod date;
pub mod reader;

pub use content::{derive_title, normalize_content, prepare_note, SAVED_IMAGE_TITLE, UNTITLED_NOTE};
pub use date::parse_timestamp;
pub use reader::{parse_enex, read_enex_file, EnexExport, RawNote, RawResource, ReadOptions};

pub type EnexResult<T> = Result<T, EnexError>;

/// Fatal reader errors.
#[derive(Debug)]
pub enum EnexError {
    /// The export path does not exist.
    SourceNotFound(PathBuf),
    Io(std::io::Error),
    /// XML is not well-formed; `position` is the byte offset.
    Xml { position: u64, message: String },
}

impl Display for EnexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceNotFound(path) => write!(f, "enex file not found: {}", path.display()),
            Self::Io(err) => write!(f, "{err}"),
            Self::Xml { position, message } => {
                write!(f, "malformed enex xml at byte {position}: {message}")
            }
        }
    }
}

impl Error for EnexError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::SourceNotFound(_) | Self::Xml { .. } => None,
        }
    }
}

impl From<std::io::Error> for EnexError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
