// src/db/models/package.rs

//! Package model - a named project within an index

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

const COLUMNS: &str =
    "id, index_id, name, auto_hide, updated_from_remote_at, parsed_external_links_at, created_at";

/// Package represents one project name on an index
#[derive(Debug, Clone)]
pub struct Package {
    pub id: Option<i64>,
    pub index_id: i64,
    pub name: String,
    /// Hide older releases when a new one is registered locally
    pub auto_hide: bool,
    pub updated_from_remote_at: Option<String>,
    pub parsed_external_links_at: Option<String>,
    pub created_at: Option<String>,
}

impl Package {
    /// Create a new Package
    pub fn new(index_id: i64, name: String) -> Self {
        Self {
            id: None,
            index_id,
            name,
            auto_hide: true,
            updated_from_remote_at: None,
            parsed_external_links_at: None,
            created_at: None,
        }
    }

    /// Insert this package into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO packages (index_id, name, auto_hide, updated_from_remote_at, parsed_external_links_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &self.index_id,
                &self.name,
                self.auto_hide as i32,
                &self.updated_from_remote_at,
                &self.parsed_external_links_at,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a package by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM packages WHERE id = ?1"))?;
        let package = stmt.query_row([id], Self::from_row).optional()?;
        Ok(package)
    }

    /// Find a package by name within an index
    pub fn find(conn: &Connection, index_id: i64, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM packages WHERE index_id = ?1 AND name = ?2"
        ))?;
        let package = stmt
            .query_row(params![index_id, name], Self::from_row)
            .optional()?;
        Ok(package)
    }

    /// Find a package by name, creating it when absent
    ///
    /// Returns the package and whether it was created.
    pub fn get_or_create(conn: &Connection, index_id: i64, name: &str) -> Result<(Self, bool)> {
        if let Some(package) = Self::find(conn, index_id, name)? {
            return Ok((package, false));
        }

        let mut package = Self::new(index_id, name.to_string());
        package.insert(conn)?;
        Ok((package, true))
    }

    /// List all packages of an index
    pub fn list_by_index(conn: &Connection, index_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM packages WHERE index_id = ?1 ORDER BY name"
        ))?;

        let packages = stmt
            .query_map([index_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(packages)
    }

    /// Search packages of an index by name substring
    pub fn search(conn: &Connection, index_id: i64, pattern: &str) -> Result<Vec<Self>> {
        let search_pattern = format!("%{pattern}%");
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM packages WHERE index_id = ?1 AND name LIKE ?2 ORDER BY name"
        ))?;

        let packages = stmt
            .query_map(params![index_id, search_pattern], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(packages)
    }

    /// Count the packages of an index
    pub fn count_by_index(conn: &Connection, index_id: i64) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM packages WHERE index_id = ?1",
            [index_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Update package flags and timestamps
    pub fn update(&self, conn: &Connection) -> Result<()> {
        let id = self.require_id()?;

        conn.execute(
            "UPDATE packages SET name = ?1, auto_hide = ?2, updated_from_remote_at = ?3,
             parsed_external_links_at = ?4 WHERE id = ?5",
            params![
                &self.name,
                self.auto_hide as i32,
                &self.updated_from_remote_at,
                &self.parsed_external_links_at,
                id,
            ],
        )?;

        Ok(())
    }

    /// ID of a persisted package
    pub fn require_id(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::InitError(format!("Package '{}' has no ID", self.name)))
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            index_id: row.get(1)?,
            name: row.get(2)?,
            auto_hide: row.get::<_, i32>(3)? != 0,
            updated_from_remote_at: row.get(4)?,
            parsed_external_links_at: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}
