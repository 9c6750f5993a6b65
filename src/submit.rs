// src/submit.rs

//! Release registration and file upload
//!
//! The local write path that sits beside sync: maintainers register release
//! metadata and upload distribution files directly into the mirror. Both
//! operations run in a single transaction and reject bad input without
//! writing anything.

use crate::db;
use crate::db::models::{
    CLASSIFIER_KEY, DEFAULT_METADATA_VERSION, Distribution, Package, PackageIndex, PackageInfo,
    Provenance, Release, ensure_classifiers,
};
use crate::db::paths::distribution_relpath;
use crate::error::{Error, Result};
use crate::hash;
use crate::repository::{validate_package_name, write_atomic};
use crate::timestamp::current_timestamp;
use rusqlite::Connection;
use std::path::Path;
use tracing::info;

/// Fields accepted for each metadata version
const METADATA_FIELDS: &[(&str, &[&str])] = &[
    ("1.0", FIELDS_1_0),
    ("1.1", FIELDS_1_1),
    ("1.2", FIELDS_1_2),
];

const FIELDS_1_0: &[&str] = &[
    "metadata_version",
    "name",
    "version",
    "platform",
    "summary",
    "description",
    "keywords",
    "home_page",
    "author",
    "author_email",
    "license",
];

const FIELDS_1_1: &[&str] = &[
    "metadata_version",
    "name",
    "version",
    "platform",
    "supported_platform",
    "summary",
    "description",
    "keywords",
    "home_page",
    "download_url",
    "author",
    "author_email",
    "license",
    "classifier",
    "requires",
    "provides",
    "obsoletes",
];

const FIELDS_1_2: &[&str] = &[
    "metadata_version",
    "name",
    "version",
    "platform",
    "supported_platform",
    "summary",
    "description",
    "keywords",
    "home_page",
    "download_url",
    "author",
    "author_email",
    "maintainer",
    "maintainer_email",
    "license",
    "classifier",
    "requires_dist",
    "provides_dist",
    "obsoletes_dist",
    "requires_python",
    "requires_external",
    "project_url",
];

/// Placeholder value setup tools write for unset fields
const UNKNOWN: &str = "UNKNOWN";

fn allowed_fields(metadata_version: &str) -> Option<&'static [&'static str]> {
    METADATA_FIELDS
        .iter()
        .find(|(version, _)| *version == metadata_version)
        .map(|(_, fields)| *fields)
}

/// Release metadata submitted by a maintainer
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub name: String,
    pub version: String,
    /// Declared metadata version; the release's current one when absent
    pub metadata_version: Option<String>,
    pub fields: PackageInfo,
}

/// A distribution file submitted by a maintainer
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content: Vec<u8>,
    pub filetype: String,
    pub pyversion: String,
    /// Declared digest; computed when empty
    pub md5_digest: String,
    pub comment: String,
    pub signature: String,
}

impl Upload {
    /// An sdist upload with no declared digest
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content,
            filetype: "sdist".to_string(),
            pyversion: String::new(),
            md5_digest: String::new(),
            comment: String::new(),
            signature: String::new(),
        }
    }
}

/// Register (or re-register) a release
///
/// Creates the package and release as needed and replaces the release's
/// metadata with the submitted fields allowed for its metadata version.
/// When the package auto-hides, every other release is hidden.
pub fn register_release(
    conn: &mut Connection,
    index: &PackageIndex,
    registration: &Registration,
) -> Result<Release> {
    let name = registration.name.trim();
    let version = registration.version.trim();
    validate_package_name(name)?;
    Release::validate_version(version)?;
    let index_id = index.require_id()?;

    db::transaction(conn, |tx| {
        let (package, _) = Package::get_or_create(tx, index_id, name)?;
        let package_id = package.require_id()?;
        let existing = Release::find(tx, package_id, version)?;

        let mut metadata_version = registration
            .metadata_version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .or_else(|| existing.as_ref().map(|r| r.metadata_version.clone()))
            .unwrap_or_else(|| DEFAULT_METADATA_VERSION.to_string());

        if allowed_fields(&metadata_version).is_none() {
            return Err(Error::ParseError(format!(
                "Metadata version must be one of: {}",
                METADATA_FIELDS
                    .iter()
                    .map(|(v, _)| *v)
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        let mut info = registration.fields.clone();
        if let Some(classifiers) = info.remove("classifiers") {
            info.set_list(CLASSIFIER_KEY, classifiers);
        }
        if metadata_version == "1.0"
            && (info.contains_key(CLASSIFIER_KEY) || info.contains_key("download_url"))
        {
            metadata_version = "1.1".to_string();
        }

        let fields = allowed_fields(&metadata_version).unwrap_or(FIELDS_1_0);
        let mut info: PackageInfo = info
            .iter()
            .filter(|(key, _)| fields.contains(&key.as_str()))
            .map(|(key, values)| (key.clone(), values.clone()))
            .collect();
        info.retain_values(|value| value != UNKNOWN);

        let mut release = match existing {
            Some(release) => release,
            None => {
                let mut release = Release::new(package_id, version.to_string());
                release.provenance = Provenance::Upload;
                release
            }
        };
        release.metadata_version = metadata_version;
        release.package_info = info;
        release.hidden = false;
        match release.id {
            Some(_) => release.update(tx)?,
            None => {
                release.insert(tx)?;
            }
        }

        ensure_classifiers(tx, release.classifiers())?;

        if package.auto_hide {
            let hidden = Release::hide_others(tx, package_id, release.require_id()?)?;
            if hidden > 0 {
                info!("Hid {} older releases of {}", hidden, package.name);
            }
        }

        info!("Registered {}", release.release_name(&package.name));
        Ok(release)
    })
}

/// Store an uploaded file as a new distribution of a release
///
/// Rejects a file whose name, or whose (filetype, pyversion), is already
/// present on the release. A declared MD5 must match the content.
pub fn upload_distribution(
    conn: &mut Connection,
    storage_root: &Path,
    package: &Package,
    release: &Release,
    upload: &Upload,
) -> Result<Distribution> {
    let release_id = release.require_id()?;
    let filename = upload.filename.trim();
    if filename.is_empty()
        || Path::new(filename).file_name().and_then(|f| f.to_str()) != Some(filename)
    {
        return Err(Error::ParseError(format!("Invalid upload filename '{filename}'")));
    }

    let relpath = distribution_relpath(&package.name, filename);
    let dest = storage_root.join(&relpath);

    db::transaction(conn, |tx| {
        if Distribution::find_by_filename(tx, release_id, filename)?.is_some() {
            return Err(Error::DuplicateUpload(format!(
                "A file named '{}' already exists for {}. Please create a new release.",
                filename,
                release.release_name(&package.name)
            )));
        }
        if Distribution::find_by_identity(tx, release_id, &upload.filetype, &upload.pyversion)?
            .is_some()
        {
            return Err(Error::DuplicateUpload(format!(
                "{} already has a {} file for Python '{}'",
                release.release_name(&package.name),
                upload.filetype,
                upload.pyversion
            )));
        }

        hash::verify_md5(&upload.content, &upload.md5_digest)?;
        let md5_digest = if upload.md5_digest.is_empty() {
            hash::md5_hex(&upload.content)
        } else {
            upload.md5_digest.to_lowercase()
        };

        let mut dist = Distribution::new(
            release_id,
            upload.filetype.clone(),
            upload.pyversion.clone(),
        );
        dist.filename = filename.to_string();
        dist.file = Some(relpath.to_string_lossy().into_owned());
        dist.size = Some(upload.content.len() as i64);
        dist.md5_digest = md5_digest;
        dist.comment = upload.comment.clone();
        dist.signature = upload.signature.clone();
        dist.uploaded_at = Some(current_timestamp());
        dist.provenance = Provenance::Upload;

        write_atomic(&dest, &upload.content)?;
        if let Err(e) = dist.insert(tx) {
            let _ = std::fs::remove_file(&dest);
            return Err(e);
        }

        info!(
            "Accepted upload {} ({} bytes) for {}",
            filename,
            upload.content.len(),
            release.release_name(&package.name)
        );
        Ok(dist)
    })
}
