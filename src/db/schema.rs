// src/db/schema.rs

//! Database schema versioning
//!
//! Tracks the applied schema version in a dedicated table and applies the
//! migrations from [`super::migrations`] in order.

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

use super::migrations;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 3;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(version)
}

/// Set the schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!("Schema migration complete. Now at version {}", SCHEMA_VERSION);
    Ok(())
}

/// Apply a specific migration version
fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrations::migrate_v1(conn),
        2 => migrations::migrate_v2(conn),
        3 => migrations::migrate_v3(conn),
        _ => Err(Error::InitError(format!(
            "Unknown migration version: {version}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        (temp_file, conn)
    }

    fn columns(conn: &Connection, table: &str) -> Vec<String> {
        conn.prepare(&format!("PRAGMA table_info({table})"))
            .unwrap()
            .query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_schema_version_tracking() {
        let (_temp, conn) = create_test_db();

        assert_eq!(get_schema_version(&conn).unwrap(), 0);

        set_schema_version(&conn, 1).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn test_migrate_creates_all_tables() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "package_indexes",
            "packages",
            "releases",
            "distributions",
            "classifiers",
            "schema_version",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
    }

    #[test]
    fn test_later_migrations_add_columns() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();

        assert!(columns(&conn, "distributions").contains(&"mirrored_at".to_string()));
        assert!(columns(&conn, "package_indexes").contains(&"changelog_since".to_string()));
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let (_temp, conn) = create_test_db();

        migrate(&conn).unwrap();
        let version1 = get_schema_version(&conn).unwrap();

        migrate(&conn).unwrap();
        let version2 = get_schema_version(&conn).unwrap();

        assert_eq!(version1, version2);
        assert_eq!(version1, SCHEMA_VERSION);
    }

    #[test]
    fn test_release_version_length_constraint() {
        let (_temp, conn) = create_test_db();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        migrate(&conn).unwrap();

        conn.execute(
            "INSERT INTO package_indexes (slug, rpc_url, simple_url) VALUES ('pypi', 'r', 's')",
            [],
        )
        .unwrap();
        conn.execute("INSERT INTO packages (index_id, name) VALUES (1, 'foo')", [])
            .unwrap();

        let too_long = "1".repeat(129);
        let result = conn.execute(
            "INSERT INTO releases (package_id, version) VALUES (1, ?1)",
            [&too_long],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_distribution_identity_is_unique() {
        let (_temp, conn) = create_test_db();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        migrate(&conn).unwrap();

        conn.execute_batch(
            "INSERT INTO package_indexes (slug, rpc_url, simple_url) VALUES ('pypi', 'r', 's');
             INSERT INTO packages (index_id, name) VALUES (1, 'foo');
             INSERT INTO releases (package_id, version) VALUES (1, '1.0');
             INSERT INTO distributions (release_id, filename, filetype, pyversion)
                 VALUES (1, 'foo-1.0.tar.gz', 'sdist', 'source');",
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO distributions (release_id, filename, filetype, pyversion)
             VALUES (1, 'foo-1.0.zip', 'sdist', 'source')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_foreign_key_constraints() {
        let (_temp, conn) = create_test_db();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        migrate(&conn).unwrap();

        // Release for a package that does not exist
        let result = conn.execute(
            "INSERT INTO releases (package_id, version) VALUES (999, '1.0')",
            [],
        );
        assert!(result.is_err());
    }
}
