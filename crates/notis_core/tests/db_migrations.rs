use notis_core::db::migrations::latest_version;
use notis_core::db::{open_db, open_db_in_memory, schema_version, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    assert_table_exists(&conn, "entries");
    assert_table_exists(&conn, "tags");
    assert_table_exists(&conn, "entry_reference_tags");
    assert_table_exists(&conn, "resources");
}

#[test]
fn open_db_creates_parent_directories_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("database").join("notes.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first).unwrap(), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second).unwrap(), latest_version());
    assert_table_exists(&conn_second, "entries");
}

#[test]
fn open_db_reports_unusable_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("data");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let err = open_db(blocker.join("database").join("notes.db")).unwrap_err();
    match err {
        DbError::CreateDir { path, .. } => assert_eq!(path, blocker.join("database")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn tag_category_is_checked_by_schema() {
    let conn = open_db_in_memory().unwrap();
    let err = conn
        .execute(
            "INSERT INTO tags (category, name) VALUES ('somewhere', 'x');",
            [],
        )
        .unwrap_err();
    assert!(err.to_string().contains("CHECK"));
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
