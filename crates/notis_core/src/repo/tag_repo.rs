//! Tag repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Upsert Where/When/Reference tags by `(category, name)`.
//! - List known tags for reporting.
//!
//! # Invariants
//! - `name` is unique within its category, compared case-insensitively
//!   (`COLLATE NOCASE`); the first-seen spelling is the stored one.
//! - Upserts never update an existing row.

use crate::model::tag::{Tag, TagCategory};
use crate::repo::{ensure_tables, RepoError, RepoResult, Upsert};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};

/// Repository interface for tag operations.
pub trait TagRepository {
    /// Inserts `name` under `category` unless it already exists.
    fn upsert_tag(&self, category: TagCategory, name: &str) -> RepoResult<Upsert<Tag>>;
    /// Looks up one tag by category and name.
    fn find_tag(&self, category: TagCategory, name: &str) -> RepoResult<Option<Tag>>;
    /// Lists tags sorted by category then name.
    fn list_tags(&self, category: Option<TagCategory>) -> RepoResult<Vec<Tag>>;
}

/// SQLite-backed tag repository.
pub struct SqliteTagRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTagRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["tags"])?;
        Ok(Self { conn })
    }
}

impl TagRepository for SqliteTagRepository<'_> {
    fn upsert_tag(&self, category: TagCategory, name: &str) -> RepoResult<Upsert<Tag>> {
        upsert_tag_in(self.conn, category, name)
    }

    fn find_tag(&self, category: TagCategory, name: &str) -> RepoResult<Option<Tag>> {
        find_tag_in(self.conn, category, name)
    }

    fn list_tags(&self, category: Option<TagCategory>) -> RepoResult<Vec<Tag>> {
        let mut sql = String::from("SELECT id, category, name FROM tags");
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(category) = category {
            sql.push_str(" WHERE category = ?");
            bind_values.push(Value::Text(category.as_str().to_string()));
        }
        sql.push_str(" ORDER BY category ASC, name ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            let category_text: String = row.get("category")?;
            tags.push(Tag {
                id: row.get("id")?,
                category: parse_category(&category_text)?,
                name: row.get("name")?,
            });
        }
        Ok(tags)
    }
}

/// Atomic insert-if-absent on any connection or open transaction.
pub(crate) fn upsert_tag_in(
    conn: &Connection,
    category: TagCategory,
    name: &str,
) -> RepoResult<Upsert<Tag>> {
    let changed = conn.execute(
        "INSERT INTO tags (category, name)
         VALUES (?1, ?2)
         ON CONFLICT (category, name) DO NOTHING;",
        params![category.as_str(), name],
    )?;

    let tag = find_tag_in(conn, category, name)?.ok_or_else(|| {
        RepoError::InvalidData(format!(
            "tag `{name}` in category `{category}` missing after upsert"
        ))
    })?;

    if changed == 0 {
        Ok(Upsert::Existing(tag))
    } else {
        Ok(Upsert::Inserted(tag))
    }
}

fn find_tag_in(conn: &Connection, category: TagCategory, name: &str) -> RepoResult<Option<Tag>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, name FROM tags
         WHERE category = ?1 AND name = ?2;",
    )?;
    let mut rows = stmt.query(params![category.as_str(), name])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(Tag {
            id: row.get(0)?,
            name: row.get(1)?,
            category,
        }));
    }
    Ok(None)
}

pub(crate) fn parse_category(value: &str) -> RepoResult<TagCategory> {
    TagCategory::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid tag category `{value}` in tags.category"))
    })
}

#[cfg(test)]
mod tests {
    use super::{SqliteTagRepository, TagRepository};
    use crate::db::open_db_in_memory;
    use crate::model::tag::TagCategory;

    #[test]
    fn upsert_is_idempotent_per_category() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTagRepository::try_new(&conn).unwrap();

        let first = repo.upsert_tag(TagCategory::Where, "home").unwrap();
        let second = repo.upsert_tag(TagCategory::Where, "home").unwrap();
        assert!(first.was_inserted());
        assert!(!second.was_inserted());
        assert_eq!(first.value().id, second.value().id);

        let other = repo.upsert_tag(TagCategory::Reference, "home").unwrap();
        assert!(other.was_inserted());
        assert_ne!(other.value().id, first.value().id);
        assert_eq!(repo.list_tags(None).unwrap().len(), 2);
        assert_eq!(
            repo.list_tags(Some(TagCategory::Where)).unwrap()[0].name,
            "home"
        );
    }

    #[test]
    fn names_match_case_insensitively_and_keep_first_spelling() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTagRepository::try_new(&conn).unwrap();

        let first = repo.upsert_tag(TagCategory::Reference, "Project-X").unwrap();
        let second = repo.upsert_tag(TagCategory::Reference, "project-x").unwrap();
        assert!(!second.was_inserted());
        assert_eq!(second.value().id, first.value().id);
        assert_eq!(second.value().name, "Project-X");
        assert_eq!(
            repo.find_tag(TagCategory::Reference, "PROJECT-X")
                .unwrap()
                .map(|tag| tag.name),
            Some("Project-X".to_string())
        );
    }

    #[test]
    fn find_tag_returns_none_for_unknown() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteTagRepository::try_new(&conn).unwrap();
        assert!(repo
            .find_tag(TagCategory::When, "never")
            .unwrap()
            .is_none());
    }
}
