//! Resource (attachment) repository.
//!
//! # Invariants
//! - `hash` is unique; a second write of the same bytes is a no-op.

use crate::model::resource::Resource;
use crate::repo::{ensure_tables, RepoError, RepoResult, Upsert};
use rusqlite::{params, Connection, Row};

/// Repository interface for resource operations.
pub trait ResourceRepository {
    /// Inserts `resource` unless its hash is already stored; returns row id.
    fn insert_if_absent(&self, resource: &Resource) -> RepoResult<Upsert<i64>>;
    fn get_by_hash(&self, hash: &str) -> RepoResult<Option<Resource>>;
    fn count_resources(&self) -> RepoResult<u64>;
}

/// SQLite-backed resource repository.
pub struct SqliteResourceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteResourceRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["resources"])?;
        Ok(Self { conn })
    }
}

impl ResourceRepository for SqliteResourceRepository<'_> {
    fn insert_if_absent(&self, resource: &Resource) -> RepoResult<Upsert<i64>> {
        let changed = self.conn.execute(
            "INSERT INTO resources (hash, file_name, mime, width, height, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (hash) DO NOTHING;",
            params![
                resource.hash.as_str(),
                resource.file_name.as_str(),
                resource.mime.as_str(),
                resource.width,
                resource.height,
                resource.data.as_slice(),
            ],
        )?;

        let id: i64 = self.conn.query_row(
            "SELECT id FROM resources WHERE hash = ?1;",
            [resource.hash.as_str()],
            |row| row.get(0),
        )?;

        if changed == 0 {
            Ok(Upsert::Existing(id))
        } else {
            Ok(Upsert::Inserted(id))
        }
    }

    fn get_by_hash(&self, hash: &str) -> RepoResult<Option<Resource>> {
        let mut stmt = self.conn.prepare(
            "SELECT hash, file_name, mime, width, height, data
             FROM resources
             WHERE hash = ?1;",
        )?;
        let mut rows = stmt.query([hash])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_resource_row(row)?));
        }
        Ok(None)
    }

    fn count_resources(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM resources;", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

fn parse_resource_row(row: &Row<'_>) -> RepoResult<Resource> {
    let width: Option<i64> = row.get("width")?;
    let height: Option<i64> = row.get("height")?;
    Ok(Resource {
        hash: row.get("hash")?,
        file_name: row.get("file_name")?,
        mime: row.get("mime")?,
        width: parse_dimension(width, "width")?,
        height: parse_dimension(height, "height")?,
        data: row.get("data")?,
    })
}

fn parse_dimension(value: Option<i64>, column: &str) -> RepoResult<Option<u32>> {
    value
        .map(|raw| {
            u32::try_from(raw).map_err(|_| {
                RepoError::InvalidData(format!("invalid {column} `{raw}` in resources.{column}"))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::{ResourceRepository, SqliteResourceRepository};
    use crate::db::open_db_in_memory;
    use crate::model::resource::Resource;

    #[test]
    fn same_bytes_are_stored_once() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteResourceRepository::try_new(&conn).unwrap();

        let mut first = Resource::from_bytes("a.png", "image/png", vec![1, 2, 3]);
        first.width = Some(4);
        let second = Resource::from_bytes("renamed.png", "image/png", vec![1, 2, 3]);

        let inserted = repo.insert_if_absent(&first).unwrap();
        let existing = repo.insert_if_absent(&second).unwrap();
        assert!(inserted.was_inserted());
        assert!(!existing.was_inserted());
        assert_eq!(inserted.value(), existing.value());
        assert_eq!(repo.count_resources().unwrap(), 1);

        let loaded = repo.get_by_hash(&first.hash).unwrap().unwrap();
        assert_eq!(loaded.file_name, "a.png");
        assert_eq!(loaded.width, Some(4));
        assert_eq!(loaded.height, None);
        assert_eq!(loaded.data, vec![1, 2, 3]);
    }
}
