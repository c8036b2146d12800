//! Numbered schema scripts for the import store.
//!
//! Scripts are embedded at build time and run in version order inside one
//! transaction, each followed by a `user_version` bump.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "init",
        sql: include_str!("0001_init.sql"),
    },
    Migration {
        version: 2,
        name: "resources",
        sql: include_str!("0002_resources.sql"),
    },
];

/// Schema version produced by the newest embedded script.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Reads `PRAGMA user_version` of an open store.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

/// Brings `conn` up to [`latest_version`].
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the store is ahead of this build.
/// - `Migration` naming the first script that failed; earlier scripts of
///   the same pass are rolled back with it.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from_version = schema_version(conn)?;
    let latest = latest_version();

    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }
    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > from_version)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in pending {
        tx.execute_batch(migration.sql)
            .and_then(|()| {
                tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
            })
            .map_err(|source| DbError::Migration {
                version: migration.version,
                name: migration.name,
                source,
            })?;
        debug!(
            "event=db_migrate module=db status=step version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={}",
        from_version, latest
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, latest_version, schema_version, MIGRATIONS};
    use rusqlite::Connection;

    #[test]
    fn versions_are_contiguous_from_one() {
        for (index, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, index + 1, "{}", migration.name);
        }
    }

    #[test]
    fn partial_store_is_upgraded_to_latest() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(MIGRATIONS[0].sql).unwrap();
        conn.execute_batch("PRAGMA user_version = 1;").unwrap();

        apply_migrations(&mut conn).unwrap();

        assert_eq!(schema_version(&conn).unwrap(), latest_version());
        let resources: i64 = conn
            .query_row("SELECT COUNT(*) FROM resources;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(resources, 0);
    }

    #[test]
    fn failing_script_is_reported_by_name_and_rolled_back() {
        let mut conn = Connection::open_in_memory().unwrap();
        // A foreign `entries` table makes the 0001 index creation fail.
        conn.execute_batch("CREATE TABLE entries (x INTEGER);").unwrap();

        let err = apply_migrations(&mut conn).unwrap_err();

        assert!(err.to_string().starts_with("migration 0001_init failed"));
        assert_eq!(schema_version(&conn).unwrap(), 0);
        let tags_exist: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'tags';",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tags_exist, 0);
    }
}
