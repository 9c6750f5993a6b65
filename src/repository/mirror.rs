// src/repository/mirror.rs

//! Artifact store for mirrored distribution files
//!
//! Files live under `{storage_root}/{bucket}/{package}/{filename}`. A file is
//! taken from a co-located local mirror by hard link (or copy) when one is
//! configured, otherwise downloaded. Downloads are checked against the
//! published MD5 and written through a temporary file so a partial download
//! never appears at the final path.

use crate::db::models::Distribution;
use crate::db::paths::distribution_relpath;
use crate::error::{Error, Result};
use crate::hash;
use crate::timestamp::current_timestamp;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Fetches distribution bytes by URL
pub trait FileFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// A pre-populated tree of distribution files on local disk
pub trait LocalMirror {
    /// Path of an existing copy of `filename`, if any
    fn locate(&self, package: &str, filename: &str) -> Option<PathBuf>;
}

/// Local mirror laid out as `{root}/{package}/{filename}`
#[derive(Debug, Clone)]
pub struct DirectoryMirror {
    root: PathBuf,
}

impl DirectoryMirror {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl LocalMirror for DirectoryMirror {
    fn locate(&self, package: &str, filename: &str) -> Option<PathBuf> {
        let path = self.root.join(package).join(filename);
        path.is_file().then_some(path)
    }
}

/// What [`ArtifactStore::mirror`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorOutcome {
    /// A local file was already recorded; nothing fetched
    AlreadyMirrored,
    /// Linked or copied from the local mirror
    Linked,
    /// Downloaded from the record's URL
    Downloaded { bytes: u64 },
    /// No local copy and no URL
    NoSource,
}

impl MirrorOutcome {
    /// Whether a file was placed in storage by this call
    pub fn stored(&self) -> bool {
        matches!(self, MirrorOutcome::Linked | MirrorOutcome::Downloaded { .. })
    }
}

/// Places distribution files into mirror storage
pub struct ArtifactStore {
    storage_root: PathBuf,
    fetcher: Box<dyn FileFetcher>,
    local_mirror: Option<Box<dyn LocalMirror>>,
    verify_md5: bool,
}

impl ArtifactStore {
    pub fn new(storage_root: impl Into<PathBuf>, fetcher: Box<dyn FileFetcher>) -> Self {
        Self {
            storage_root: storage_root.into(),
            fetcher,
            local_mirror: None,
            verify_md5: true,
        }
    }

    /// Prefer files from a local mirror over downloading
    pub fn with_local_mirror(mut self, mirror: Box<dyn LocalMirror>) -> Self {
        self.local_mirror = Some(mirror);
        self
    }

    /// Toggle MD5 verification of fetched files
    pub fn with_md5_verification(mut self, verify: bool) -> Self {
        self.verify_md5 = verify;
        self
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Absolute path of a storage-relative file
    pub fn absolute_path(&self, relpath: &str) -> PathBuf {
        self.storage_root.join(relpath)
    }

    /// Ensure a distribution's file is in storage
    ///
    /// With `overwrite` unset, a record that already has a local file is
    /// left alone and nothing is fetched. On success the record's `file` and
    /// `mirrored_at` are set; with `commit` the record is also saved.
    pub fn mirror(
        &self,
        conn: &Connection,
        dist: &mut Distribution,
        package_name: &str,
        overwrite: bool,
        commit: bool,
    ) -> Result<MirrorOutcome> {
        if !overwrite && dist.is_hosted_locally() {
            debug!("{} already mirrored", dist.filename);
            return Ok(MirrorOutcome::AlreadyMirrored);
        }

        if dist.filename.is_empty()
            && let Some(name) = dist.url.as_deref().and_then(filename_from_url)
        {
            dist.filename = name;
        }
        check_path_component(package_name)?;
        check_path_component(&dist.filename)?;

        let relpath = distribution_relpath(package_name, &dist.filename);
        let dest = self.storage_root.join(&relpath);

        let located = self
            .local_mirror
            .as_ref()
            .and_then(|m| m.locate(package_name, &dist.filename));

        let outcome = if let Some(source) = located {
            self.link_from_local(&source, &dest, &dist.md5_digest)?;
            MirrorOutcome::Linked
        } else if let Some(url) = dist.url.clone() {
            let bytes = self.fetcher.fetch(&url)?;
            if self.verify_md5 {
                hash::verify_md5(&bytes, &dist.md5_digest)
                    .map_err(|e| Error::DownloadFailure(format!("{url}: {e}")))?;
            }
            write_atomic(&dest, &bytes)?;
            info!("Mirrored {} ({} bytes)", dist.filename, bytes.len());
            MirrorOutcome::Downloaded {
                bytes: bytes.len() as u64,
            }
        } else {
            warn!("{} has neither a local copy nor a URL", dist.filename);
            return Ok(MirrorOutcome::NoSource);
        };

        dist.file = Some(relpath.to_string_lossy().into_owned());
        dist.mirrored_at = Some(current_timestamp());
        if commit {
            dist.save(conn)?;
        }

        Ok(outcome)
    }

    fn link_from_local(&self, source: &Path, dest: &Path, md5: &str) -> Result<()> {
        if self.verify_md5 {
            hash::verify_file_md5(source, md5).map_err(|e| {
                Error::DownloadFailure(format!("{}: {e}", source.display()))
            })?;
        }

        prepare_parent(dest)?;
        if dest.exists() {
            fs::remove_file(dest).map_err(|e| {
                Error::DownloadFailure(format!("Failed to replace {}: {e}", dest.display()))
            })?;
        }

        match fs::hard_link(source, dest) {
            Ok(()) => debug!("Linked {} -> {}", source.display(), dest.display()),
            Err(e) => {
                debug!("Hard link failed ({}), copying {}", e, source.display());
                let temp = temp_path(dest);
                fs::copy(source, &temp)
                    .and_then(|_| fs::rename(&temp, dest))
                    .map_err(|e| {
                        let _ = fs::remove_file(&temp);
                        Error::DownloadFailure(format!(
                            "Failed to copy {} to {}: {e}",
                            source.display(),
                            dest.display()
                        ))
                    })?;
            }
        }
        Ok(())
    }
}

/// Last path segment of a URL, without query or fragment
fn filename_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .next_back()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn check_path_component(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(Error::DownloadFailure(format!(
            "Refusing unsafe storage path component '{name}'"
        )));
    }
    Ok(())
}

fn temp_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

fn prepare_parent(dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            Error::DownloadFailure(format!(
                "Failed to create directory {}: {e}",
                parent.display()
            ))
        })?;
    }
    Ok(())
}

/// Write bytes to `dest` through a temporary sibling and rename
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    prepare_parent(dest)?;
    let temp = temp_path(dest);

    fs::write(&temp, bytes)
        .and_then(|_| fs::rename(&temp, dest))
        .map_err(|e| {
            let _ = fs::remove_file(&temp);
            Error::DownloadFailure(format!("Failed to write {}: {e}", dest.display()))
        })
}
