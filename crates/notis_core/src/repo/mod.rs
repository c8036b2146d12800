//! Repository layer for the import store.
//!
//! # Responsibility
//! - Define use-case oriented persistence contracts for tags, entries and
//!   resources.
//! - Keep SQL details behind the repository boundary.
//!
//! # Invariants
//! - Every write path is an atomic insert-if-absent keyed by a unique
//!   constraint (`ON CONFLICT ... DO NOTHING`), never lookup-then-insert.
//! - Repositories borrow an explicit store handle; no global session.

use crate::db::DbError;
use crate::model::entry::{EntryId, EntryValidationError};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod entry_repo;
pub mod resource_repo;
pub mod tag_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(EntryValidationError),
    Db(DbError),
    NotFound(EntryId),
    InvalidData(String),
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "entry not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "store is missing required table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) | Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<EntryValidationError> for RepoError {
    fn from(value: EntryValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Result of an insert-if-absent write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upsert<T> {
    /// Row did not exist and was written.
    Inserted(T),
    /// An equivalent row already existed; nothing was written.
    Existing(T),
}

impl<T> Upsert<T> {
    pub fn was_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Inserted(value) | Self::Existing(value) => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Inserted(value) | Self::Existing(value) => value,
        }
    }
}

pub(crate) fn ensure_tables(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    for table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [*table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(*table));
        }
    }
    Ok(())
}
