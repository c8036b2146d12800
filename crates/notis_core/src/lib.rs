//! Core domain logic for the notis importer.
//! This crate owns the ENEX pipeline and every storage invariant; the CLI
//! only wires configuration and prints reports.

pub mod classify;
pub mod config;
pub mod db;
pub mod enex;
pub mod images;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use classify::{classify_tags, normalize_tag, resolve_kind, TagVocabulary};
pub use config::{ConfigError, FieldLimits, ImportConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use enex::{parse_enex, read_enex_file, EnexError, ReadOptions};
pub use images::{ImageError, ImageStore};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::entry::{ClassifiedTags, Entry, EntryId, EntryKind, EntryValidationError};
pub use model::resource::Resource;
pub use model::tag::{Tag, TagCategory};
pub use repo::entry_repo::{EntryListQuery, EntryRepository, SqliteEntryRepository};
pub use repo::resource_repo::{ResourceRepository, SqliteResourceRepository};
pub use repo::tag_repo::{SqliteTagRepository, TagRepository};
pub use repo::{RepoError, RepoResult, Upsert};
pub use service::import_service::{ImportError, ImportReport, ImportService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
