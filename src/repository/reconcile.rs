// src/repository/reconcile.rs

//! Metadata reconciliation
//!
//! Turns upstream payloads into local records. Every operation is an upsert
//! keyed by the record's natural identity: releases by (package, version),
//! distributions by (release, filetype, pyversion). Nothing is ever deleted.

use crate::db::models::{
    CLASSIFIER_KEY, DEFAULT_METADATA_VERSION, Distribution, Package, PackageInfo, Provenance,
    Release, ensure_classifiers,
};
use crate::error::Result;
use crate::timestamp::parse_upload_time;
use rusqlite::Connection;
use tracing::{debug, warn};

use super::filename::ParsedFilename;
use super::remote::{DistributionDescriptor, ReleaseData};
use super::xmlrpc::Value;

/// Upstream key flagging a hidden release
pub const HIDDEN_KEY: &str = "_pypi_hidden";

/// How a reconciliation changed the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Created,
    Updated,
    Unchanged,
    /// Existing record has a local file and was left alone
    KeptLocal,
}

/// An externally hosted file discovered from a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalFile {
    pub filename: String,
    /// Link URL without its fragment
    pub url: String,
    pub md5_digest: String,
    pub parsed: ParsedFilename,
}

/// Convert an upstream metadata mapping to stored form
///
/// Values are flattened to string lists; the upstream `classifiers` list is
/// stored under the repeated `classifier` key.
pub fn package_info_from(data: &ReleaseData) -> PackageInfo {
    data.iter()
        .map(|(key, value)| {
            let key = if key == "classifiers" {
                CLASSIFIER_KEY.to_string()
            } else {
                key.clone()
            };
            (key, value.to_strings())
        })
        .collect()
}

/// Upserts upstream metadata into the store
pub struct MetadataReconciler<'a> {
    conn: &'a Connection,
}

impl<'a> MetadataReconciler<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create or fully replace a release from its upstream metadata
    ///
    /// Fails with `InvalidVersion` before touching the store when the
    /// version cannot be held.
    pub fn reconcile_release(
        &self,
        package: &Package,
        version: &str,
        data: &ReleaseData,
    ) -> Result<Release> {
        Release::validate_version(version)?;
        let package_id = package.require_id()?;

        let hidden = data.get(HIDDEN_KEY).is_some_and(Value::truthy);
        let metadata_version = data
            .get("metadata_version")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_METADATA_VERSION)
            .to_string();

        let release = match Release::find(self.conn, package_id, version)? {
            Some(mut release) => {
                release.package_info = package_info_from(data);
                release.hidden = hidden;
                release.metadata_version = metadata_version;
                if release.provenance == Provenance::External {
                    release.provenance = Provenance::Remote;
                }
                release.update(self.conn)?;
                debug!("Updated {} {}", package.name, version);
                release
            }
            None => {
                let mut release = Release::new(package_id, version.to_string());
                release.package_info = package_info_from(data);
                release.hidden = hidden;
                release.metadata_version = metadata_version;
                release.insert(self.conn)?;
                debug!("Created {} {}", package.name, version);
                release
            }
        };

        ensure_classifiers(self.conn, release.classifiers())?;
        Ok(release)
    }

    /// Build the upserted distribution record for an upstream descriptor
    ///
    /// The record is returned unsaved so the caller can attach a mirrored
    /// file first and persist once.
    pub fn reconcile_distribution(
        &self,
        release: &Release,
        desc: &DistributionDescriptor,
    ) -> Result<(Distribution, ReconcileAction)> {
        let release_id = release.require_id()?;
        let existing = Distribution::find_by_identity(
            self.conn,
            release_id,
            &desc.packagetype,
            &desc.python_version,
        )?;

        let (mut dist, action) = match existing {
            Some(dist) => (dist, ReconcileAction::Updated),
            None => (
                Distribution::new(
                    release_id,
                    desc.packagetype.clone(),
                    desc.python_version.clone(),
                ),
                ReconcileAction::Created,
            ),
        };

        dist.filename = desc.filename.clone();
        dist.url = desc.url.clone();
        dist.md5_digest = desc.md5_digest.clone();
        dist.size = desc.size;
        dist.comment = desc.comment_text.clone();
        dist.provenance = Provenance::Remote;

        // An unparsable upload time keeps whatever the record already had
        if let Some(raw) = desc.upload_time.as_deref() {
            match parse_upload_time(raw) {
                Ok(ts) => dist.uploaded_at = Some(ts),
                Err(e) => warn!("{}: {}", desc.filename, e),
            }
        }

        Ok((dist, action))
    }

    /// Record an externally hosted file against a release
    ///
    /// Records that already have a local file are never repointed.
    pub fn reconcile_external(
        &self,
        release: &Release,
        file: &ExternalFile,
    ) -> Result<ReconcileAction> {
        let release_id = release.require_id()?;
        let existing = Distribution::find_by_identity(
            self.conn,
            release_id,
            file.parsed.filetype,
            &file.parsed.pyversion,
        )?;

        match existing {
            None => {
                let mut dist = Distribution::new(
                    release_id,
                    file.parsed.filetype.to_string(),
                    file.parsed.pyversion.clone(),
                );
                dist.filename = file.filename.clone();
                dist.url = Some(file.url.clone());
                dist.md5_digest = file.md5_digest.clone();
                dist.provenance = Provenance::External;
                dist.insert(self.conn)?;
                Ok(ReconcileAction::Created)
            }
            Some(dist) if dist.is_hosted_locally() => Ok(ReconcileAction::KeptLocal),
            Some(dist)
                if dist.url.as_deref() == Some(file.url.as_str())
                    && dist.filename == file.filename =>
            {
                Ok(ReconcileAction::Unchanged)
            }
            Some(mut dist) => {
                dist.filename = file.filename.clone();
                dist.url = Some(file.url.clone());
                if !file.md5_digest.is_empty() {
                    dist.md5_digest = file.md5_digest.clone();
                }
                dist.provenance = Provenance::External;
                dist.update(self.conn)?;
                Ok(ReconcileAction::Updated)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::models::{PackageIndex, list_classifiers};
    use crate::error::Error;
    use crate::repository::filename::parse_filename;

    fn setup() -> (Connection, Package) {
        let conn = db::open_in_memory().unwrap();
        let mut index = PackageIndex::new(
            "pypi".to_string(),
            "https://pypi.example/pypi".to_string(),
            "https://pypi.example/simple".to_string(),
        );
        let index_id = index.insert(&conn).unwrap();
        let (package, _) = Package::get_or_create(&conn, index_id, "foo").unwrap();
        (conn, package)
    }

    fn payload(summary: &str) -> ReleaseData {
        let mut data = ReleaseData::new();
        data.insert("name".to_string(), Value::from("foo"));
        data.insert("summary".to_string(), Value::from(summary));
        data.insert("metadata_version".to_string(), Value::from("1.1"));
        data.insert(
            "classifiers".to_string(),
            Value::Array(vec![
                Value::from("Framework :: Django"),
                Value::from("Programming Language :: Python"),
            ]),
        );
        data
    }

    fn descriptor() -> DistributionDescriptor {
        DistributionDescriptor {
            filename: "foo-1.0.tar.gz".to_string(),
            url: Some("https://files.example/foo-1.0.tar.gz".to_string()),
            md5_digest: "0123456789abcdef0123456789abcdef".to_string(),
            size: Some(100),
            packagetype: "sdist".to_string(),
            python_version: "source".to_string(),
            comment_text: String::new(),
            upload_time: Some("20110523T12:34:56".to_string()),
        }
    }

    fn external(filename: &str, url: &str) -> ExternalFile {
        ExternalFile {
            filename: filename.to_string(),
            url: url.to_string(),
            md5_digest: String::new(),
            parsed: parse_filename(filename).unwrap(),
        }
    }

    #[test]
    fn test_package_info_from_payload() {
        let info = package_info_from(&payload("Foo"));
        assert_eq!(info.get("summary"), Some("Foo"));
        assert_eq!(info.get_list(CLASSIFIER_KEY).len(), 2);
        assert!(!info.contains_key("classifiers"));
    }

    #[test]
    fn test_release_is_created_then_fully_replaced() {
        let (conn, package) = setup();
        let reconciler = MetadataReconciler::new(&conn);

        let mut data = payload("First");
        data.insert("keywords".to_string(), Value::from("web"));
        let created = reconciler.reconcile_release(&package, "1.0", &data).unwrap();
        assert_eq!(created.metadata_version, "1.1");
        assert!(!created.hidden);

        let mut data = payload("Second");
        data.insert(HIDDEN_KEY.to_string(), Value::Bool(true));
        let updated = reconciler.reconcile_release(&package, "1.0", &data).unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.summary(), "Second");
        assert!(updated.hidden);
        // Full replace: keys absent from the new payload are gone
        assert!(!updated.package_info.contains_key("keywords"));
        assert_eq!(list_classifiers(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_version_touches_nothing() {
        let (conn, package) = setup();
        let reconciler = MetadataReconciler::new(&conn);

        let long = "1".repeat(129);
        assert!(matches!(
            reconciler.reconcile_release(&package, &long, &payload("x")),
            Err(Error::InvalidVersion(_))
        ));
        assert!(Release::list_by_package(&conn, package.id.unwrap())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_distribution_upsert_by_identity() {
        let (conn, package) = setup();
        let reconciler = MetadataReconciler::new(&conn);
        let release = reconciler.reconcile_release(&package, "1.0", &payload("x")).unwrap();

        let (mut dist, action) = reconciler
            .reconcile_distribution(&release, &descriptor())
            .unwrap();
        assert_eq!(action, ReconcileAction::Created);
        assert_eq!(dist.uploaded_at.as_deref(), Some("2011-05-23T12:34:56+00:00"));
        dist.save(&conn).unwrap();

        let mut changed = descriptor();
        changed.md5_digest = "fedcba9876543210fedcba9876543210".to_string();
        changed.upload_time = Some("yesterday".to_string());
        let (dist2, action) = reconciler.reconcile_distribution(&release, &changed).unwrap();

        assert_eq!(action, ReconcileAction::Updated);
        assert_eq!(dist2.id, dist.id);
        assert_eq!(dist2.md5_digest, changed.md5_digest);
        // Unparsable upload time leaves the previous value in place
        assert_eq!(dist2.uploaded_at.as_deref(), Some("2011-05-23T12:34:56+00:00"));
    }

    #[test]
    fn test_new_distribution_without_usable_upload_time() {
        let (conn, package) = setup();
        let reconciler = MetadataReconciler::new(&conn);
        let release = reconciler.reconcile_release(&package, "1.0", &payload("x")).unwrap();

        let mut garbled = descriptor();
        garbled.upload_time = Some("last tuesday".to_string());
        let (mut dist, action) = reconciler.reconcile_distribution(&release, &garbled).unwrap();
        assert_eq!(action, ReconcileAction::Created);
        assert!(dist.uploaded_at.is_none());
        dist.save(&conn).unwrap();

        let mut egg = descriptor();
        egg.filename = "foo-1.0-py2.7.egg".to_string();
        egg.packagetype = "bdist_egg".to_string();
        egg.python_version = "2.7".to_string();
        egg.upload_time = None;
        let (mut dist, action) = reconciler.reconcile_distribution(&release, &egg).unwrap();
        assert_eq!(action, ReconcileAction::Created);
        assert!(dist.uploaded_at.is_none());
        dist.save(&conn).unwrap();

        let stored = Distribution::list_by_release(&conn, release.id.unwrap()).unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|d| d.uploaded_at.is_none()));

        // A later well-formed time fills it in
        let (dist, _) = reconciler.reconcile_distribution(&release, &descriptor()).unwrap();
        assert_eq!(dist.uploaded_at.as_deref(), Some("2011-05-23T12:34:56+00:00"));
    }

    #[test]
    fn test_external_links_respect_local_files() {
        let (conn, package) = setup();
        let reconciler = MetadataReconciler::new(&conn);
        let release = reconciler.reconcile_release(&package, "1.0", &payload("x")).unwrap();

        let file = external("foo-1.0.tar.gz", "https://elsewhere.example/foo-1.0.tar.gz");
        assert_eq!(
            reconciler.reconcile_external(&release, &file).unwrap(),
            ReconcileAction::Created
        );
        assert_eq!(
            reconciler.reconcile_external(&release, &file).unwrap(),
            ReconcileAction::Unchanged
        );

        let moved = external("foo-1.0.tar.gz", "https://mirror.example/foo-1.0.tar.gz");
        assert_eq!(
            reconciler.reconcile_external(&release, &moved).unwrap(),
            ReconcileAction::Updated
        );

        let mut dist = Distribution::find_by_identity(&conn, release.id.unwrap(), "sdist", "source")
            .unwrap()
            .unwrap();
        assert_eq!(dist.provenance, Provenance::External);
        dist.file = Some("f/foo/foo-1.0.tar.gz".to_string());
        dist.save(&conn).unwrap();

        let again = external("foo-1.0.tar.gz", "https://third.example/foo-1.0.tar.gz");
        assert_eq!(
            reconciler.reconcile_external(&release, &again).unwrap(),
            ReconcileAction::KeptLocal
        );
        let kept = Distribution::find_by_id(&conn, dist.id.unwrap()).unwrap().unwrap();
        assert_eq!(kept.url.as_deref(), Some("https://mirror.example/foo-1.0.tar.gz"));
    }
}
