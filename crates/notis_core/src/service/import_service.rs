//! ENEX import use-case.
//!
//! # Responsibility
//! - Run one import pass: read, normalize, classify, resolve, persist.
//! - Apply configured field limits before anything reaches storage.
//! - Report per-run counters so callers can tell new rows from re-imports.
//!
//! # Invariants
//! - Only a missing/malformed export or a storage failure aborts the run;
//!   per-note and per-resource problems are logged and skipped.
//! - Every persisted row is written through an insert-if-absent path, so
//!   running the same export twice adds nothing.

use crate::classify::{classify_tags, resolve_kind, TagVocabulary};
use crate::config::{FieldLimits, ImportConfig};
use crate::enex::{
    parse_timestamp, prepare_note, read_enex_file, EnexError, RawNote, RawResource, ReadOptions,
};
use crate::images::{decode_resource, ImageStore};
use crate::logging::sanitize_message;
use crate::model::entry::{ClassifiedTags, Entry, EntryKind};
use crate::repo::entry_repo::{EntryRepository, SqliteEntryRepository};
use crate::repo::resource_repo::{ResourceRepository, SqliteResourceRepository};
use crate::repo::{RepoError, RepoResult};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rusqlite::Connection;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Instant;

const LOG_TITLE_MAX_CHARS: usize = 48;
const REMINDER_ATTRIBUTE: &str = "reminder-time";

/// Fatal import errors.
#[derive(Debug)]
pub enum ImportError {
    Source(EnexError),
    Repo(RepoError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Source(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<EnexError> for ImportError {
    fn from(value: EnexError) -> Self {
        Self::Source(value)
    }
}

impl From<RepoError> for ImportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Counters for one import pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub notes_read: usize,
    pub notes_skipped: usize,
    pub tasks_inserted: usize,
    pub tasks_existing: usize,
    pub notes_inserted: usize,
    pub notes_existing: usize,
    pub resources_inserted: usize,
    pub resources_existing: usize,
    pub resources_skipped: usize,
    pub images_written: usize,
    pub image_write_failures: usize,
}

impl ImportReport {
    /// Rows added by this pass.
    pub fn inserted(&self) -> usize {
        self.tasks_inserted + self.notes_inserted + self.resources_inserted
    }
}

/// Import service over entry and resource repositories.
pub struct ImportService<E: EntryRepository, R: ResourceRepository> {
    entries: E,
    resources: R,
    vocabulary: TagVocabulary,
    limits: FieldLimits,
    images: Option<ImageStore>,
}

impl<'conn> ImportService<SqliteEntryRepository<'conn>, SqliteResourceRepository<'conn>> {
    /// Builds a SQLite-backed service from a migrated connection and config.
    pub fn for_connection(conn: &'conn Connection, config: &ImportConfig) -> RepoResult<Self> {
        let vocabulary = config.vocabulary();
        for tag in vocabulary.overlapping() {
            warn!(
                "event=config_check module=import status=warn reason=tag_in_both_vocabularies tag={tag}"
            );
        }

        Ok(Self::new(
            SqliteEntryRepository::try_new(conn)?,
            SqliteResourceRepository::try_new(conn)?,
            vocabulary,
            config.limits,
            config
                .images
                .write_files
                .then(|| ImageStore::new(config.images.folder.clone())),
        ))
    }
}

impl<E: EntryRepository, R: ResourceRepository> ImportService<E, R> {
    pub fn new(
        entries: E,
        resources: R,
        vocabulary: TagVocabulary,
        limits: FieldLimits,
        images: Option<ImageStore>,
    ) -> Self {
        Self {
            entries,
            resources,
            vocabulary,
            limits,
            images,
        }
    }

    /// Imports one export file.
    ///
    /// # Errors
    /// - `ImportError::Source` when the file is missing or not well-formed.
    /// - `ImportError::Repo` on storage failure; rows written before the
    ///   failure stay committed and a re-run resumes cleanly.
    pub fn import_file(
        &self,
        path: impl AsRef<Path>,
        options: ReadOptions,
    ) -> Result<ImportReport, ImportError> {
        let path = path.as_ref();
        let started_at = Instant::now();
        info!(
            "event=import module=import status=start path={}",
            path.display()
        );

        let export = read_enex_file(path, options).map_err(|err| {
            warn!("event=import module=import status=error error={err}");
            err
        })?;
        let report = self.import_notes(export.notes)?;

        info!(
            "event=import module=import status=ok duration_ms={} notes_read={} notes_skipped={} tasks_inserted={} notes_inserted={} resources_inserted={} images_written={}",
            started_at.elapsed().as_millis(),
            report.notes_read,
            report.notes_skipped,
            report.tasks_inserted,
            report.notes_inserted,
            report.resources_inserted,
            report.images_written
        );
        Ok(report)
    }

    /// Imports already-parsed notes.
    pub fn import_notes(&self, notes: Vec<RawNote>) -> Result<ImportReport, ImportError> {
        let mut report = ImportReport::default();
        for raw in notes {
            report.notes_read += 1;
            self.import_note(raw, &mut report)?;
        }
        Ok(report)
    }

    fn import_note(&self, raw: RawNote, report: &mut ImportReport) -> Result<(), ImportError> {
        let Some(mut note) = prepare_note(raw) else {
            report.notes_skipped += 1;
            return Ok(());
        };
        let resources = std::mem::take(&mut note.resources);

        let entry = self.build_entry(&note);
        let log_title = sanitize_message(&entry.title, LOG_TITLE_MAX_CHARS);
        let outcome = self.entries.insert_if_absent(&entry)?;
        debug!(
            "event=entry_upsert module=import status=ok kind={} inserted={} title={}",
            entry.kind,
            outcome.was_inserted(),
            log_title
        );
        match (entry.kind, outcome.was_inserted()) {
            (EntryKind::Task, true) => report.tasks_inserted += 1,
            (EntryKind::Task, false) => report.tasks_existing += 1,
            (EntryKind::Note, true) => report.notes_inserted += 1,
            (EntryKind::Note, false) => report.notes_existing += 1,
        }

        for raw_resource in &resources {
            self.import_resource(raw_resource, &log_title, report)?;
        }
        Ok(())
    }

    fn build_entry(&self, note: &RawNote) -> Entry {
        let tags = self.limit_tags(classify_tags(&note.tags, &self.vocabulary));
        let kind = resolve_kind(&tags);
        let now = Utc::now();

        let created = parse_field_timestamp(note.created.as_deref(), "created").unwrap_or(now);
        let updated = parse_field_timestamp(note.updated.as_deref(), "updated")
            .unwrap_or(now)
            .max(created);

        let mut entry = Entry::new(
            kind,
            truncate_field(&note.title, self.limits.title, "title"),
            truncate_field(&note.content, self.limits.body_text, "body_text"),
            tags,
            created,
        );
        entry.updated = updated;
        entry.reminder =
            parse_field_timestamp(note.attribute(REMINDER_ATTRIBUTE), REMINDER_ATTRIBUTE);
        entry
    }

    fn limit_tags(&self, tags: ClassifiedTags) -> ClassifiedTags {
        let limit = self.limits.tag_name;
        ClassifiedTags {
            where_tag: tags
                .where_tag
                .map(|tag| truncate_field(&tag, limit, "tag_name")),
            when_tag: tags
                .when_tag
                .map(|tag| truncate_field(&tag, limit, "tag_name")),
            reference_tags: tags
                .reference_tags
                .iter()
                .map(|tag| truncate_field(tag, limit, "tag_name"))
                .collect(),
        }
    }

    fn import_resource(
        &self,
        raw: &RawResource,
        log_title: &str,
        report: &mut ImportReport,
    ) -> Result<(), ImportError> {
        let resource = match decode_resource(raw, &self.limits) {
            Ok(resource) => resource,
            Err(err) => {
                report.resources_skipped += 1;
                warn!(
                    "event=resource_skip module=import status=skipped note={} file_name={} error={}",
                    log_title,
                    raw.file_name.as_deref().unwrap_or("-"),
                    err
                );
                return Ok(());
            }
        };

        if self.resources.insert_if_absent(&resource)?.was_inserted() {
            report.resources_inserted += 1;
        } else {
            report.resources_existing += 1;
        }

        if let Some(store) = self.images.as_ref() {
            match store.save(&resource) {
                Ok(Some(path)) => {
                    report.images_written += 1;
                    debug!(
                        "event=image_write module=import status=ok path={}",
                        path.display()
                    );
                }
                Ok(None) => {}
                Err(err) => {
                    report.image_write_failures += 1;
                    warn!(
                        "event=image_write module=import status=error hash={} error={}",
                        resource.hash, err
                    );
                }
            }
        }
        Ok(())
    }
}

fn parse_field_timestamp(value: Option<&str>, field: &str) -> Option<DateTime<Utc>> {
    let raw = value?;
    let parsed = parse_timestamp(raw);
    if parsed.is_none() {
        debug!("event=timestamp_parse module=import status=fallback field={field}");
    }
    parsed
}

fn truncate_field(value: &str, max_chars: usize, field: &str) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    warn!(
        "event=field_truncate module=import status=warn field={} max_chars={}",
        field, max_chars
    );
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::{ImportReport, ImportService};
    use crate::classify::TagVocabulary;
    use crate::config::FieldLimits;
    use crate::db::open_db_in_memory;
    use crate::enex::{RawNote, RawResource};
    use crate::model::entry::EntryKind;
    use crate::repo::entry_repo::{EntryListQuery, EntryRepository, SqliteEntryRepository};
    use crate::repo::resource_repo::{ResourceRepository, SqliteResourceRepository};
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use rusqlite::Connection;

    const PNG_HEADER: [u8; 16] = [
        0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0x0d, b'I', b'H', b'D', b'R',
    ];

    fn service(
        conn: &Connection,
        limits: FieldLimits,
    ) -> ImportService<SqliteEntryRepository<'_>, SqliteResourceRepository<'_>> {
        ImportService::new(
            SqliteEntryRepository::try_new(conn).unwrap(),
            SqliteResourceRepository::try_new(conn).unwrap(),
            TagVocabulary::new(["home", "office"], ["today", "urgent"]),
            limits,
            None,
        )
    }

    fn note(title: &str, content: &str, tags: &[&str]) -> RawNote {
        RawNote {
            title: title.to_string(),
            content: format!("<en-note><div>{content}</div></en-note>"),
            created: Some("20240102T030405Z".to_string()),
            updated: Some("20240103T030405Z".to_string()),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            ..RawNote::default()
        }
    }

    #[test]
    fn routes_tasks_and_notes_and_skips_empty_notes() {
        let conn = open_db_in_memory().unwrap();
        let service = service(&conn, FieldLimits::default());

        let report = service
            .import_notes(vec![
                note("Fix sink", "Call plumber", &["Home", "Today", "plumbing"]),
                note("Recipe", "Flour, water", &["cooking"]),
                RawNote {
                    title: "Untitled Note".to_string(),
                    ..RawNote::default()
                },
            ])
            .unwrap();

        assert_eq!(report.notes_read, 3);
        assert_eq!(report.notes_skipped, 1);
        assert_eq!(report.tasks_inserted, 1);
        assert_eq!(report.notes_inserted, 1);

        let entries = SqliteEntryRepository::try_new(&conn).unwrap();
        let tasks = entries
            .list_entries(&EntryListQuery {
                kind: Some(EntryKind::Task),
                ..EntryListQuery::default()
            })
            .unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].tags.where_tag.as_deref(), Some("Home"));
        assert_eq!(tasks[0].tags.when_tag.as_deref(), Some("Today"));
        assert!(tasks[0].tags.reference_tags.contains("plumbing"));
        assert_eq!(tasks[0].body_text, "Call plumber");
    }

    #[test]
    fn second_pass_reports_existing_rows_only() {
        let conn = open_db_in_memory().unwrap();
        let service = service(&conn, FieldLimits::default());
        let notes = vec![
            note("Fix sink", "Call plumber", &["home"]),
            note("Recipe", "Flour, water", &[]),
        ];

        let first = service.import_notes(notes.clone()).unwrap();
        let second = service.import_notes(notes).unwrap();

        assert_eq!(first.inserted(), 2);
        assert_eq!(
            second,
            ImportReport {
                notes_read: 2,
                tasks_existing: 1,
                notes_existing: 1,
                ..ImportReport::default()
            }
        );
        let entries = SqliteEntryRepository::try_new(&conn).unwrap();
        assert_eq!(entries.count_entries(None).unwrap(), 2);
    }

    #[test]
    fn report_serializes_with_flat_counter_fields() {
        let conn = open_db_in_memory().unwrap();
        let service = service(&conn, FieldLimits::default());
        let report = service
            .import_notes(vec![note("Fix sink", "Call plumber", &["home"])])
            .unwrap();

        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["notes_read"], 1);
        assert_eq!(json["tasks_inserted"], 1);
        assert_eq!(json["notes_inserted"], 0);
        assert_eq!(json.as_object().unwrap().len(), 11);
    }

    #[test]
    fn updated_before_created_is_clamped_and_reminder_is_read() {
        let conn = open_db_in_memory().unwrap();
        let service = service(&conn, FieldLimits::default());
        let mut raw = note("Dentist", "Book appointment", &["urgent"]);
        raw.updated = Some("20200101T000000Z".to_string());
        raw.attributes
            .insert("reminder-time".to_string(), "20240110T090000Z".to_string());

        service.import_notes(vec![raw]).unwrap();

        let entries = SqliteEntryRepository::try_new(&conn).unwrap();
        let stored = entries.list_entries(&EntryListQuery::default()).unwrap();
        assert_eq!(stored[0].updated, stored[0].created);
        assert!(stored[0].reminder.is_some());
    }

    #[test]
    fn long_fields_are_truncated_to_limits() {
        let conn = open_db_in_memory().unwrap();
        let limits = FieldLimits {
            title: 5,
            tag_name: 3,
            ..FieldLimits::default()
        };
        let service = service(&conn, limits);

        service
            .import_notes(vec![note("A very long title", "body", &["reference"])])
            .unwrap();

        let entries = SqliteEntryRepository::try_new(&conn).unwrap();
        let stored = entries.list_entries(&EntryListQuery::default()).unwrap();
        assert_eq!(stored[0].title, "A ver");
        assert!(stored[0].tags.reference_tags.contains("ref"));
    }

    #[test]
    fn shared_images_are_stored_once_and_bad_resources_skipped() {
        let conn = open_db_in_memory().unwrap();
        let service = service(&conn, FieldLimits::default());
        let image = RawResource {
            data: Some(BASE64.encode(PNG_HEADER)),
            mime: Some("image/png".to_string()),
            file_name: Some("sink.png".to_string()),
            ..RawResource::default()
        };
        let broken = RawResource {
            data: Some("not base64 at all!".to_string()),
            mime: Some("image/png".to_string()),
            ..RawResource::default()
        };

        let mut first = note("Fix sink", "photo", &["home"]);
        first.resources = vec![image.clone(), broken];
        let mut second = note("Recipe", "same photo", &[]);
        second.resources = vec![image];

        let report = service.import_notes(vec![first, second]).unwrap();
        assert_eq!(report.resources_inserted, 1);
        assert_eq!(report.resources_existing, 1);
        assert_eq!(report.resources_skipped, 1);

        let resources = SqliteResourceRepository::try_new(&conn).unwrap();
        assert_eq!(resources.count_resources().unwrap(), 1);
    }
}
