// src/db/models/release.rs

//! Release model - one version of a package

use super::package_info::{CLASSIFIER_KEY, PackageInfo};
use super::provenance::{Provenance, provenance_from_column};
use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

/// Longest version string the store accepts
pub const MAX_VERSION_LEN: usize = 128;

/// Metadata version assigned when upstream does not declare one
pub const DEFAULT_METADATA_VERSION: &str = "1.0";

const COLUMNS: &str =
    "id, package_id, version, metadata_version, package_info, hidden, provenance, created_at";

/// Release represents one version of a package
#[derive(Debug, Clone)]
pub struct Release {
    pub id: Option<i64>,
    pub package_id: i64,
    pub version: String,
    pub metadata_version: String,
    pub package_info: PackageInfo,
    pub hidden: bool,
    pub provenance: Provenance,
    pub created_at: Option<String>,
}

impl Release {
    /// Create a new Release
    pub fn new(package_id: i64, version: String) -> Self {
        Self {
            id: None,
            package_id,
            version,
            metadata_version: DEFAULT_METADATA_VERSION.to_string(),
            package_info: PackageInfo::new(),
            hidden: false,
            provenance: Provenance::Remote,
            created_at: None,
        }
    }

    /// Reject versions the store cannot hold
    pub fn validate_version(version: &str) -> Result<()> {
        if version.is_empty() || version.chars().count() > MAX_VERSION_LEN {
            return Err(Error::InvalidVersion(version.to_string()));
        }
        Ok(())
    }

    /// Insert this release into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        Self::validate_version(&self.version)?;

        conn.execute(
            "INSERT INTO releases (package_id, version, metadata_version, package_info, hidden, provenance)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &self.package_id,
                &self.version,
                &self.metadata_version,
                self.package_info.to_json()?,
                self.hidden as i32,
                self.provenance.as_str(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Save all mutable fields
    pub fn update(&self, conn: &Connection) -> Result<()> {
        let id = self.require_id()?;

        conn.execute(
            "UPDATE releases SET metadata_version = ?1, package_info = ?2, hidden = ?3,
             provenance = ?4 WHERE id = ?5",
            params![
                &self.metadata_version,
                self.package_info.to_json()?,
                self.hidden as i32,
                self.provenance.as_str(),
                id,
            ],
        )?;

        Ok(())
    }

    /// Find a release by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM releases WHERE id = ?1"))?;
        let release = stmt.query_row([id], Self::from_row).optional()?;
        Ok(release)
    }

    /// Find a release by package and version
    pub fn find(conn: &Connection, package_id: i64, version: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM releases WHERE package_id = ?1 AND version = ?2"
        ))?;
        let release = stmt
            .query_row(params![package_id, version], Self::from_row)
            .optional()?;
        Ok(release)
    }

    /// List releases of a package, newest first
    pub fn list_by_package(conn: &Connection, package_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM releases WHERE package_id = ?1 ORDER BY created_at DESC, id DESC"
        ))?;

        let releases = stmt
            .query_map([package_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(releases)
    }

    /// Most recently created release of a package
    pub fn latest(conn: &Connection, package_id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM releases WHERE package_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT 1"
        ))?;
        let release = stmt.query_row([package_id], Self::from_row).optional()?;
        Ok(release)
    }

    /// Hide every release of a package except `keep_id`
    pub fn hide_others(conn: &Connection, package_id: i64, keep_id: i64) -> Result<usize> {
        let changed = conn.execute(
            "UPDATE releases SET hidden = 1 WHERE package_id = ?1 AND id != ?2 AND hidden = 0",
            params![package_id, keep_id],
        )?;
        Ok(changed)
    }

    /// `{package}-{version}`
    pub fn release_name(&self, package_name: &str) -> String {
        format!("{}-{}", package_name, self.version)
    }

    pub fn summary(&self) -> &str {
        self.package_info.get("summary").unwrap_or("")
    }

    pub fn description(&self) -> &str {
        self.package_info.get("description").unwrap_or("")
    }

    pub fn classifiers(&self) -> &[String] {
        self.package_info.get_list(CLASSIFIER_KEY)
    }

    /// ID of a persisted release
    pub fn require_id(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::InitError(format!("Release '{}' has no ID", self.version)))
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let info_json: String = row.get(4)?;
        let package_info = PackageInfo::from_json(&info_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    e.to_string(),
                )),
            )
        })?;

        Ok(Self {
            id: Some(row.get(0)?),
            package_id: row.get(1)?,
            version: row.get(2)?,
            metadata_version: row.get(3)?,
            package_info,
            hidden: row.get::<_, i32>(5)? != 0,
            provenance: provenance_from_column(6, row.get(6)?)?,
            created_at: row.get(7)?,
        })
    }
}
