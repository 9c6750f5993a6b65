// src/db/mod.rs

//! SQLite record store
//!
//! The store is the single source of local truth: indexes, packages,
//! releases, distributions and classifiers. The synchronization engine, the
//! submission interface and any view layer all read and write it directly.

pub mod migrations;
pub mod models;
pub mod paths;
pub mod schema;

use crate::error::{Error, Result};
use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Create the database file (and its parent directory) and apply all migrations
pub fn init(db_path: &str) -> Result<()> {
    info!("Initializing database at {}", db_path);

    if let Some(parent) = Path::new(db_path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::InitError(format!(
                "Failed to create database directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    let conn = Connection::open(db_path)?;
    configure(&conn)?;
    schema::migrate(&conn)?;
    Ok(())
}

/// Open an existing database and bring its schema up to date
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        return Err(Error::NotFoundError(format!(
            "Database not found at {db_path}; run 'indexmirror init' first"
        )));
    }

    let conn = Connection::open(db_path)?;
    configure(&conn)?;
    schema::migrate(&conn)?;
    debug!("Opened database {}", db_path);
    Ok(conn)
}

/// Open a private in-memory database with the full schema
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    schema::migrate(&conn)?;
    Ok(conn)
}

/// Run `f` inside a transaction, committing on success and rolling back on error
pub fn transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::PackageIndex;

    #[test]
    fn test_init_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested/mirror.db");
        let db_path = db_path.to_str().unwrap();

        init(db_path).unwrap();
        let conn = open(db_path).unwrap();
        assert_eq!(schema::get_schema_version(&conn).unwrap(), schema::SCHEMA_VERSION);
    }

    #[test]
    fn test_open_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("missing.db");

        let result = open(db_path.to_str().unwrap());
        assert!(matches!(result, Err(Error::NotFoundError(_))));
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let mut conn = open_in_memory().unwrap();

        let result: Result<()> = transaction(&mut conn, |tx| {
            let mut index = PackageIndex::new(
                "pypi".to_string(),
                "https://pypi.example/pypi".to_string(),
                "https://pypi.example/simple".to_string(),
            );
            index.insert(tx)?;
            Err(Error::ConflictError("abort".to_string()))
        });

        assert!(result.is_err());
        assert!(PackageIndex::find_by_slug(&conn, "pypi").unwrap().is_none());
    }
}
