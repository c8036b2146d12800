use notis_core::db::open_db;
use notis_core::{
    EntryKind, EntryListQuery, EntryRepository, ImportConfig, ImportError, ImportService,
    ReadOptions, ResourceRepository, SqliteEntryRepository, SqliteResourceRepository,
    SqliteTagRepository, TagCategory, TagRepository,
};
use notis_core::enex::EnexError;
use std::path::{Path, PathBuf};

const PNG_HASH: &str = "7cddabe5df64daaa6924a5613dd2150a";

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("sample.enex")
}

fn config_for(root: &Path, profile: Option<&str>) -> ImportConfig {
    let yaml = format!(
        r#"
base:
  database:
    path: {db}
  tags:
    where: [home, office]
    when: [today, urgent]
  images:
    folder: {images}
  logging:
    level: warn
no_files:
  images:
    write_files: false
"#,
        db = root.join("notes.db").display(),
        images = root.join("images").display(),
    );
    ImportConfig::from_yaml_str(&yaml, profile).unwrap()
}

#[test]
fn import_classifies_notes_and_stores_images() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path(), None);
    let conn = open_db(&config.database.path).unwrap();
    let service = ImportService::for_connection(&conn, &config).unwrap();

    let report = service.import_file(fixture(), ReadOptions::default()).unwrap();

    assert_eq!(report.notes_read, 4);
    assert_eq!(report.notes_skipped, 1);
    assert_eq!(report.tasks_inserted, 1);
    assert_eq!(report.notes_inserted, 2);
    assert_eq!(report.resources_inserted, 1);
    assert_eq!(report.resources_existing, 1);
    assert_eq!(report.resources_skipped, 1);
    assert_eq!(report.images_written, 2);
    assert_eq!(report.image_write_failures, 0);

    let entries = SqliteEntryRepository::try_new(&conn).unwrap();
    let tasks = entries
        .list_entries(&EntryListQuery {
            kind: Some(EntryKind::Task),
            ..EntryListQuery::default()
        })
        .unwrap();
    assert_eq!(tasks.len(), 1);
    let task = &tasks[0];
    assert_eq!(task.title, "Fix kitchen sink");
    assert_eq!(task.tags.where_tag.as_deref(), Some("Home"));
    assert_eq!(task.tags.when_tag.as_deref(), Some("urgent"));
    assert_eq!(
        task.tags.reference_tags.iter().collect::<Vec<_>>(),
        vec!["project-x"]
    );
    assert!(task.body_text.starts_with("Call the <b>plumber</b> & buy a washer"));
    assert!(task.reminder.is_some());
    assert!(task.updated > task.created);

    let notes = entries
        .list_entries(&EntryListQuery {
            kind: Some(EntryKind::Note),
            ..EntryListQuery::default()
        })
        .unwrap();
    let titles: Vec<&str> = notes.iter().map(|note| note.title.as_str()).collect();
    assert_eq!(titles, vec!["Reading list", "Saved Image"]);
    assert!(notes.iter().all(|note| !note.tags.has_context()));

    let resources = SqliteResourceRepository::try_new(&conn).unwrap();
    assert_eq!(resources.count_resources().unwrap(), 1);
    let stored = resources.get_by_hash(PNG_HASH).unwrap().unwrap();
    assert_eq!(stored.file_name, "sink.png");
    assert_eq!((stored.width, stored.height), (Some(640), Some(480)));

    let images = dir.path().join("images");
    assert!(images.join(format!("sink_{PNG_HASH}.png")).is_file());
    assert!(images.join(format!("{PNG_HASH}.png")).is_file());

    let tags = SqliteTagRepository::try_new(&conn).unwrap();
    let references = tags.list_tags(Some(TagCategory::Reference)).unwrap();
    let names: Vec<&str> = references.iter().map(|tag| tag.name.as_str()).collect();
    assert_eq!(names, vec!["project-x", "reading"]);

    let where_tags = tags.list_tags(Some(TagCategory::Where)).unwrap();
    assert_eq!(where_tags.len(), 1);
    assert_eq!(where_tags[0].name, "Home");
}

#[test]
fn reimporting_same_file_adds_no_rows_or_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path(), None);
    let conn = open_db(&config.database.path).unwrap();
    let service = ImportService::for_connection(&conn, &config).unwrap();

    let first = service.import_file(fixture(), ReadOptions::default()).unwrap();
    let second = service.import_file(fixture(), ReadOptions::default()).unwrap();

    assert!(first.inserted() > 0);
    assert_eq!(second.inserted(), 0);
    assert_eq!(second.tasks_existing, 1);
    assert_eq!(second.notes_existing, 2);
    assert_eq!(second.resources_existing, 2);
    assert_eq!(second.images_written, 0);

    let entries = SqliteEntryRepository::try_new(&conn).unwrap();
    assert_eq!(entries.count_entries(None).unwrap(), 3);
    assert_eq!(entries.count_entries(Some(EntryKind::Task)).unwrap(), 1);
}

#[test]
fn max_notes_limits_the_pass() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path(), None);
    let conn = open_db(&config.database.path).unwrap();
    let service = ImportService::for_connection(&conn, &config).unwrap();

    let report = service
        .import_file(fixture(), ReadOptions { max_notes: Some(1) })
        .unwrap();

    assert_eq!(report.notes_read, 1);
    assert_eq!(report.tasks_inserted, 1);
    assert_eq!(report.notes_inserted, 0);
}

#[test]
fn disabled_image_files_still_store_resources() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path(), Some("no_files"));
    assert!(!config.images.write_files);

    let conn = open_db(&config.database.path).unwrap();
    let service = ImportService::for_connection(&conn, &config).unwrap();
    let report = service.import_file(fixture(), ReadOptions::default()).unwrap();

    assert_eq!(report.resources_inserted, 1);
    assert_eq!(report.images_written, 0);
    assert!(!dir.path().join("images").exists());
}

#[test]
fn missing_export_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path(), None);
    let conn = open_db(&config.database.path).unwrap();
    let service = ImportService::for_connection(&conn, &config).unwrap();

    let err = service
        .import_file(dir.path().join("missing.enex"), ReadOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ImportError::Source(EnexError::SourceNotFound(_))
    ));

    let entries = SqliteEntryRepository::try_new(&conn).unwrap();
    assert_eq!(entries.count_entries(None).unwrap(), 0);
}
