//! Entry (task/note) repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist classified entries with their tag links.
//! - Deduplicate on `(kind, fingerprint)` so re-imports are no-ops.
//! - Provide read models for reporting and tests.
//!
//! # Invariants
//! - An entry row and its tag links are written in one transaction.
//! - Tag rows needed by an entry are upserted even when the entry itself
//!   already exists.
//! - List order is `created_at ASC, uuid ASC`.

use crate::model::entry::{ClassifiedTags, Entry, EntryId, EntryKind};
use crate::model::tag::TagCategory;
use crate::repo::tag_repo::upsert_tag_in;
use crate::repo::{ensure_tables, RepoError, RepoResult, Upsert};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use uuid::Uuid;

const ENTRY_SELECT_SQL: &str = "SELECT
    e.uuid,
    e.kind,
    e.title,
    e.body_text,
    e.created_at,
    e.updated_at,
    e.reminder_at,
    wt.name AS where_name,
    nt.name AS when_name
FROM entries e
LEFT JOIN tags wt ON wt.id = e.where_tag_id
LEFT JOIN tags nt ON nt.id = e.when_tag_id";

/// Query options for listing entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryListQuery {
    pub kind: Option<EntryKind>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for entry operations.
pub trait EntryRepository {
    /// Inserts `entry` unless an entry with the same kind and fingerprint
    /// exists. Returns the stored id either way.
    fn insert_if_absent(&self, entry: &Entry) -> RepoResult<Upsert<EntryId>>;
    fn get_entry(&self, id: EntryId) -> RepoResult<Option<Entry>>;
    fn list_entries(&self, query: &EntryListQuery) -> RepoResult<Vec<Entry>>;
    fn count_entries(&self, kind: Option<EntryKind>) -> RepoResult<u64>;
}

/// SQLite-backed entry repository.
pub struct SqliteEntryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntryRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["entries", "tags", "entry_reference_tags"])?;
        Ok(Self { conn })
    }
}

impl EntryRepository for SqliteEntryRepository<'_> {
    fn insert_if_absent(&self, entry: &Entry) -> RepoResult<Upsert<EntryId>> {
        entry.validate()?;
        let fingerprint = entry.fingerprint();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let where_tag_id = match entry.tags.where_tag.as_deref() {
            Some(name) => Some(upsert_tag_in(&tx, TagCategory::Where, name)?.into_inner().id),
            None => None,
        };
        let when_tag_id = match entry.tags.when_tag.as_deref() {
            Some(name) => Some(upsert_tag_in(&tx, TagCategory::When, name)?.into_inner().id),
            None => None,
        };
        let mut reference_ids = Vec::with_capacity(entry.tags.reference_tags.len());
        for name in &entry.tags.reference_tags {
            reference_ids.push(upsert_tag_in(&tx, TagCategory::Reference, name)?.into_inner().id);
        }

        let changed = tx.execute(
            "INSERT INTO entries (
                uuid,
                kind,
                title,
                body_text,
                created_at,
                updated_at,
                reminder_at,
                where_tag_id,
                when_tag_id,
                fingerprint
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT (kind, fingerprint) DO NOTHING;",
            params![
                entry.uuid.to_string(),
                entry.kind.as_str(),
                entry.title.as_str(),
                entry.body_text.as_str(),
                entry.created.timestamp_millis(),
                entry.updated.timestamp_millis(),
                entry.reminder.map(|value| value.timestamp_millis()),
                where_tag_id,
                when_tag_id,
                fingerprint.as_str(),
            ],
        )?;

        if changed == 0 {
            let existing: String = tx.query_row(
                "SELECT uuid FROM entries WHERE kind = ?1 AND fingerprint = ?2;",
                params![entry.kind.as_str(), fingerprint.as_str()],
                |row| row.get(0),
            )?;
            tx.commit()?;
            return Ok(Upsert::Existing(parse_uuid(&existing)?));
        }

        let uuid_text = entry.uuid.to_string();
        for tag_id in reference_ids {
            tx.execute(
                "INSERT OR IGNORE INTO entry_reference_tags (entry_uuid, tag_id)
                 VALUES (?1, ?2);",
                params![uuid_text.as_str(), tag_id],
            )?;
        }
        tx.commit()?;

        Ok(Upsert::Inserted(entry.uuid))
    }

    fn get_entry(&self, id: EntryId) -> RepoResult<Option<Entry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ENTRY_SELECT_SQL} WHERE e.uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entry_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn list_entries(&self, query: &EntryListQuery) -> RepoResult<Vec<Entry>> {
        let mut sql = format!("{ENTRY_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(kind) = query.kind {
            sql.push_str(" AND e.kind = ?");
            bind_values.push(Value::Text(kind.as_str().to_string()));
        }

        sql.push_str(" ORDER BY e.created_at ASC, e.uuid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_entry_row(self.conn, row)?);
        }
        Ok(entries)
    }

    fn count_entries(&self, kind: Option<EntryKind>) -> RepoResult<u64> {
        let count: i64 = match kind {
            Some(kind) => self.conn.query_row(
                "SELECT COUNT(*) FROM entries WHERE kind = ?1;",
                [kind.as_str()],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM entries;", [], |row| row.get(0))?,
        };
        Ok(count.max(0) as u64)
    }
}

fn parse_entry_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Entry> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = parse_uuid(&uuid_text)?;

    let kind_text: String = row.get("kind")?;
    let kind = EntryKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid entry kind `{kind_text}` in entries.kind"))
    })?;

    let reminder = match row.get::<_, Option<i64>>("reminder_at")? {
        Some(ms) => Some(parse_millis(ms, "reminder_at")?),
        None => None,
    };

    let entry = Entry {
        uuid,
        kind,
        title: row.get("title")?,
        body_text: row.get("body_text")?,
        created: parse_millis(row.get("created_at")?, "created_at")?,
        updated: parse_millis(row.get("updated_at")?, "updated_at")?,
        reminder,
        tags: ClassifiedTags {
            where_tag: row.get("where_name")?,
            when_tag: row.get("when_name")?,
            reference_tags: load_reference_tags(conn, &uuid_text)?,
        },
    };
    entry.validate()?;
    Ok(entry)
}

fn load_reference_tags(conn: &Connection, entry_uuid: &str) -> RepoResult<BTreeSet<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.name
         FROM entry_reference_tags ert
         INNER JOIN tags t ON t.id = ert.tag_id
         WHERE ert.entry_uuid = ?1;",
    )?;
    let mut rows = stmt.query([entry_uuid])?;
    let mut tags = BTreeSet::new();
    while let Some(row) = rows.next()? {
        tags.insert(row.get::<_, String>(0)?);
    }
    Ok(tags)
}

fn parse_uuid(value: &str) -> RepoResult<EntryId> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in entries.uuid")))
}

fn parse_millis(value: i64, column: &str) -> RepoResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value).ok_or_else(|| {
        RepoError::InvalidData(format!("out-of-range timestamp `{value}` in entries.{column}"))
    })
}
