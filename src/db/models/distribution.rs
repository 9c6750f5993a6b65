// src/db/models/distribution.rs

//! Distribution model - a distributable file of a release
//!
//! A distribution is identified by (release, filetype, pyversion). Metadata
//! arrives first; the file itself is attached later when it is mirrored or
//! uploaded.

use super::provenance::{Provenance, provenance_from_column};
use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

const COLUMNS: &str = "id, release_id, filename, file, url, size, md5_digest, filetype, pyversion,
     comment, signature, uploaded_at, mirrored_at, provenance, created_at, updated_at";

/// Human-readable labels for distribution file types
const FILE_TYPE_LABELS: &[(&str, &str)] = &[
    ("sdist", "Source"),
    ("bdist_dumb", "\"dumb\" binary"),
    ("bdist_rpm", "RPM"),
    ("bdist_wininst", "MS Windows installer"),
    ("bdist_msi", "MS Windows MSI installer"),
    ("bdist_egg", "Python Egg"),
    ("bdist_dmg", "OS X Disk Image"),
    ("bdist_wheel", "Python Wheel"),
];

/// Distribution represents one file of a release
#[derive(Debug, Clone)]
pub struct Distribution {
    pub id: Option<i64>,
    pub release_id: i64,
    /// Filename as published upstream
    pub filename: String,
    /// Storage-relative path of the mirrored file
    pub file: Option<String>,
    /// Original upstream URL
    pub url: Option<String>,
    pub size: Option<i64>,
    pub md5_digest: String,
    pub filetype: String,
    pub pyversion: String,
    pub comment: String,
    pub signature: String,
    /// Upload time on the upstream index
    pub uploaded_at: Option<String>,
    /// When the file was fetched into this mirror
    pub mirrored_at: Option<String>,
    pub provenance: Provenance,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Distribution {
    /// Create a new Distribution
    pub fn new(release_id: i64, filetype: String, pyversion: String) -> Self {
        Self {
            id: None,
            release_id,
            filename: String::new(),
            file: None,
            url: None,
            size: None,
            md5_digest: String::new(),
            filetype,
            pyversion,
            comment: String::new(),
            signature: String::new(),
            uploaded_at: None,
            mirrored_at: None,
            provenance: Provenance::Remote,
            created_at: None,
            updated_at: None,
        }
    }

    /// Whether the file is stored in this mirror
    pub fn is_hosted_locally(&self) -> bool {
        self.file.is_some()
    }

    /// Where the file can be fetched from: the local copy if present, otherwise upstream
    pub fn path(&self) -> Option<&str> {
        self.file.as_deref().or(self.url.as_deref())
    }

    /// Label for the file type, falling back to the raw code
    pub fn display_filetype(&self) -> &str {
        FILE_TYPE_LABELS
            .iter()
            .find(|(code, _)| *code == self.filetype)
            .map(|(_, label)| *label)
            .unwrap_or(&self.filetype)
    }

    /// Insert this distribution into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO distributions
             (release_id, filename, file, url, size, md5_digest, filetype, pyversion,
              comment, signature, uploaded_at, mirrored_at, provenance)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                &self.release_id,
                &self.filename,
                &self.file,
                &self.url,
                &self.size,
                &self.md5_digest,
                &self.filetype,
                &self.pyversion,
                &self.comment,
                &self.signature,
                &self.uploaded_at,
                &self.mirrored_at,
                self.provenance.as_str(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Save all mutable fields
    pub fn update(&self, conn: &Connection) -> Result<()> {
        let id = self.id.ok_or_else(|| {
            Error::InitError(format!("Distribution '{}' has no ID", self.filename))
        })?;

        conn.execute(
            "UPDATE distributions SET filename = ?1, file = ?2, url = ?3, size = ?4,
             md5_digest = ?5, comment = ?6, signature = ?7, uploaded_at = ?8,
             mirrored_at = ?9, provenance = ?10, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?11",
            params![
                &self.filename,
                &self.file,
                &self.url,
                &self.size,
                &self.md5_digest,
                &self.comment,
                &self.signature,
                &self.uploaded_at,
                &self.mirrored_at,
                self.provenance.as_str(),
                id,
            ],
        )?;

        Ok(())
    }

    /// Insert or update depending on whether the record is persisted
    pub fn save(&mut self, conn: &Connection) -> Result<i64> {
        match self.id {
            Some(id) => {
                self.update(conn)?;
                Ok(id)
            }
            None => self.insert(conn),
        }
    }

    /// Find a distribution by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt =
            conn.prepare(&format!("SELECT {COLUMNS} FROM distributions WHERE id = ?1"))?;
        let dist = stmt.query_row([id], Self::from_row).optional()?;
        Ok(dist)
    }

    /// Find a distribution by its identity triple
    pub fn find_by_identity(
        conn: &Connection,
        release_id: i64,
        filetype: &str,
        pyversion: &str,
    ) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM distributions
             WHERE release_id = ?1 AND filetype = ?2 AND pyversion = ?3"
        ))?;
        let dist = stmt
            .query_row(params![release_id, filetype, pyversion], Self::from_row)
            .optional()?;
        Ok(dist)
    }

    /// Find a distribution of a release by filename
    pub fn find_by_filename(
        conn: &Connection,
        release_id: i64,
        filename: &str,
    ) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM distributions WHERE release_id = ?1 AND filename = ?2"
        ))?;
        let dist = stmt
            .query_row(params![release_id, filename], Self::from_row)
            .optional()?;
        Ok(dist)
    }

    /// List distributions of a release in insertion order
    pub fn list_by_release(conn: &Connection, release_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM distributions WHERE release_id = ?1 ORDER BY id"
        ))?;

        let dists = stmt
            .query_map([release_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(dists)
    }

    /// List distributions of every release of a package
    pub fn list_by_package(conn: &Connection, package_id: i64) -> Result<Vec<Self>> {
        let columns = COLUMNS
            .split(',')
            .map(|c| format!("d.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT {columns} FROM distributions d
             JOIN releases r ON r.id = d.release_id
             WHERE r.package_id = ?1 ORDER BY r.id, d.id"
        ))?;

        let dists = stmt
            .query_map([package_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(dists)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            release_id: row.get(1)?,
            filename: row.get(2)?,
            file: row.get(3)?,
            url: row.get(4)?,
            size: row.get(5)?,
            md5_digest: row.get(6)?,
            filetype: row.get(7)?,
            pyversion: row.get(8)?,
            comment: row.get(9)?,
            signature: row.get(10)?,
            uploaded_at: row.get(11)?,
            mirrored_at: row.get(12)?,
            provenance: provenance_from_column(13, row.get(13)?)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_hosting_and_path() {
        let mut dist = Distribution::new(1, "sdist".to_string(), "source".to_string());
        assert!(!dist.is_hosted_locally());
        assert_eq!(dist.path(), None);

        dist.url = Some("https://files.example/foo-1.0.tar.gz".to_string());
        assert_eq!(dist.path(), Some("https://files.example/foo-1.0.tar.gz"));

        dist.file = Some("f/foo/foo-1.0.tar.gz".to_string());
        assert!(dist.is_hosted_locally());
        assert_eq!(dist.path(), Some("f/foo/foo-1.0.tar.gz"));
    }

    #[test]
    fn test_display_filetype() {
        let dist = Distribution::new(1, "bdist_egg".to_string(), "2.7".to_string());
        assert_eq!(dist.display_filetype(), "Python Egg");

        let dist = Distribution::new(1, "bdist_custom".to_string(), String::new());
        assert_eq!(dist.display_filetype(), "bdist_custom");
    }
}
