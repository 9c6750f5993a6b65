// src/db/models/package_index.rs

//! PackageIndex model - an upstream package index being mirrored

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

const COLUMNS: &str =
    "id, slug, rpc_url, simple_url, last_sync, changelog_since, created_at";

/// PackageIndex represents one upstream source
#[derive(Debug, Clone)]
pub struct PackageIndex {
    pub id: Option<i64>,
    pub slug: String,
    /// XML-RPC endpoint
    pub rpc_url: String,
    /// Base URL of the simple index (`{simple_url}/{package}/`)
    pub simple_url: String,
    /// Last completed full sync
    pub last_sync: Option<String>,
    /// Changelog cursor for incremental syncs
    pub changelog_since: Option<String>,
    pub created_at: Option<String>,
}

impl PackageIndex {
    /// Create a new PackageIndex
    pub fn new(slug: String, rpc_url: String, simple_url: String) -> Self {
        Self {
            id: None,
            slug,
            rpc_url,
            simple_url,
            last_sync: None,
            changelog_since: None,
            created_at: None,
        }
    }

    /// Insert this index into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO package_indexes (slug, rpc_url, simple_url, last_sync, changelog_since)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &self.slug,
                &self.rpc_url,
                &self.simple_url,
                &self.last_sync,
                &self.changelog_since,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find an index by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt =
            conn.prepare(&format!("SELECT {COLUMNS} FROM package_indexes WHERE id = ?1"))?;
        let index = stmt.query_row([id], Self::from_row).optional()?;
        Ok(index)
    }

    /// Find an index by slug
    pub fn find_by_slug(conn: &Connection, slug: &str) -> Result<Option<Self>> {
        let mut stmt =
            conn.prepare(&format!("SELECT {COLUMNS} FROM package_indexes WHERE slug = ?1"))?;
        let index = stmt.query_row([slug], Self::from_row).optional()?;
        Ok(index)
    }

    /// List all indexes
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt =
            conn.prepare(&format!("SELECT {COLUMNS} FROM package_indexes ORDER BY slug"))?;

        let indexes = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(indexes)
    }

    /// Update index settings and cursors
    pub fn update(&self, conn: &Connection) -> Result<()> {
        let id = self.require_id()?;

        conn.execute(
            "UPDATE package_indexes SET slug = ?1, rpc_url = ?2, simple_url = ?3,
             last_sync = ?4, changelog_since = ?5 WHERE id = ?6",
            params![
                &self.slug,
                &self.rpc_url,
                &self.simple_url,
                &self.last_sync,
                &self.changelog_since,
                id,
            ],
        )?;

        Ok(())
    }

    /// Delete an index and, through cascading keys, everything it owns
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM package_indexes WHERE id = ?1", [id])?;
        Ok(())
    }

    /// ID of a persisted index
    pub fn require_id(&self) -> Result<i64> {
        self.id.ok_or_else(|| {
            Error::InitError(format!("Package index '{}' has no ID", self.slug))
        })
    }

    /// Simple-index page URL for a package
    pub fn simple_page_url(&self, package_name: &str) -> String {
        format!("{}/{}/", self.simple_url.trim_end_matches('/'), package_name)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            slug: row.get(1)?,
            rpc_url: row.get(2)?,
            simple_url: row.get(3)?,
            last_sync: row.get(4)?,
            changelog_since: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}
