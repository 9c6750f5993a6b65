// src/repository/sync.rs

//! Index synchronization
//!
//! The orchestrator drives a run against one upstream index: a full sync
//! walks every package the index lists, an incremental sync walks the
//! packages named in the changelog since the stored cursor. Each package is
//! synced in isolation; its failure is recorded in the report and the run
//! moves on.

use crate::db::models::{Distribution, Package, PackageIndex, Release};
use crate::error::{Error, Result};
use crate::timestamp::{current_timestamp, parse_timestamp};
use indicatif::ProgressBar;
use rusqlite::Connection;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::links::{ExternalLinkScanner, PageFetcher, ScanReport};
use super::mirror::{ArtifactStore, MirrorOutcome};
use super::reconcile::MetadataReconciler;
use super::remote::{ChangelogEntry, RemoteIndex, validate_package_name};

/// Maximum retry attempts for transient upstream failures
pub const MAX_RETRIES: u32 = 3;

/// Base retry delay; attempt `n` waits `n` times this long
pub const RETRY_DELAY: Duration = Duration::from_millis(1000);

/// What a run should do beyond recording package names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Fetch release lists and release metadata
    pub update_releases: bool,
    /// Fetch distribution descriptors for each release
    pub update_distributions: bool,
    /// Place distribution files in storage
    pub mirror_distributions: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            update_releases: true,
            update_distributions: true,
            mirror_distributions: false,
        }
    }
}

impl SyncOptions {
    /// Record package names only
    pub fn names_only() -> Self {
        Self {
            update_releases: false,
            update_distributions: false,
            mirror_distributions: false,
        }
    }

    /// Metadata plus file mirroring
    pub fn with_mirroring() -> Self {
        Self {
            mirror_distributions: true,
            ..Self::default()
        }
    }
}

/// Retry policy for transient upstream failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            delay: RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Never retry
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }
}

/// How far a package got in this run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PackageSyncState {
    Pending,
    MetadataSynced,
    DistributionsSynced,
    Mirrored,
}

/// Per-package result of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOutcome {
    pub name: String,
    /// The package record was created by this run
    pub created: bool,
    pub state: PackageSyncState,
    pub releases: usize,
    pub distributions: usize,
    pub mirrored: usize,
    /// Releases and files skipped, with the reason
    pub skipped: Vec<String>,
}

impl PackageOutcome {
    fn new(name: &str, created: bool) -> Self {
        Self {
            name: name.to_string(),
            created,
            state: PackageSyncState::Pending,
            releases: 0,
            distributions: 0,
            mirrored: 0,
            skipped: Vec::new(),
        }
    }
}

/// A package that failed during a run
#[derive(Debug)]
pub struct SyncFailure {
    pub package: String,
    pub error: Error,
}

/// Result of a run
#[derive(Debug, Default)]
pub struct SyncReport {
    pub packages: Vec<PackageOutcome>,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn created(&self) -> usize {
        self.packages.iter().filter(|p| p.created).count()
    }

    pub fn releases(&self) -> usize {
        self.packages.iter().map(|p| p.releases).sum()
    }

    pub fn distributions(&self) -> usize {
        self.packages.iter().map(|p| p.distributions).sum()
    }

    pub fn mirrored(&self) -> usize {
        self.packages.iter().map(|p| p.mirrored).sum()
    }

    /// Outcome for one package, if it succeeded
    pub fn outcome(&self, name: &str) -> Option<&PackageOutcome> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Failure for one package, if it failed
    pub fn failure(&self, name: &str) -> Option<&SyncFailure> {
        self.failures.iter().find(|f| f.package == name)
    }
}

/// Result of an external-link scan over several packages
#[derive(Debug, Default)]
pub struct LinkScanReport {
    pub scans: Vec<ScanReport>,
    pub failures: Vec<SyncFailure>,
}

impl LinkScanReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn discovered(&self) -> usize {
        self.scans.iter().map(|s| s.discovered).sum()
    }

    pub fn created(&self) -> usize {
        self.scans.iter().map(|s| s.created).sum()
    }
}

/// Distinct package names of a changelog, in first-seen order
pub fn changed_packages(entries: &[ChangelogEntry]) -> Vec<String> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter(|entry| seen.insert(entry.name.as_str()))
        .map(|entry| entry.name.clone())
        .collect()
}

/// Drives synchronization of one index
pub struct SyncOrchestrator<'a> {
    conn: &'a Connection,
    index: PackageIndex,
    remote: &'a dyn RemoteIndex,
    store: &'a ArtifactStore,
    retry: RetryPolicy,
    progress: Option<ProgressBar>,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(
        conn: &'a Connection,
        index: PackageIndex,
        remote: &'a dyn RemoteIndex,
        store: &'a ArtifactStore,
    ) -> Self {
        Self {
            conn,
            index,
            remote,
            store,
            retry: RetryPolicy::default(),
            progress: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Report per-package progress on a bar
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn index(&self) -> &PackageIndex {
        &self.index
    }

    /// Sync every package the index lists
    ///
    /// Failing to list packages fails the run. On completion the index's
    /// `last_sync` and changelog cursor move to the time the run started.
    pub fn full_sync(&mut self, options: SyncOptions) -> Result<SyncReport> {
        let started = current_timestamp();
        info!("Full sync of index '{}'", self.index.slug);

        let names = self.retrying("list_packages", || self.remote.list_packages())?;
        info!("Index '{}' lists {} packages", self.index.slug, names.len());

        let report = self.sync_packages(&names, options);

        self.index.last_sync = Some(started.clone());
        self.index.changelog_since = Some(started);
        self.index.update(self.conn)?;

        self.log_report("Full sync", &report);
        Ok(report)
    }

    /// Sync packages changed since the stored cursor
    ///
    /// The cursor is the last changelog position, falling back to the last
    /// full sync. An index that has never synced has no cursor.
    pub fn incremental_sync(&mut self, options: SyncOptions) -> Result<SyncReport> {
        let cursor = self
            .index
            .changelog_since
            .as_deref()
            .or(self.index.last_sync.as_deref())
            .ok_or_else(|| {
                Error::NotFoundError(format!(
                    "Index '{}' has never been synced; run a full sync first",
                    self.index.slug
                ))
            })?;
        let since = parse_timestamp(cursor)?;
        self.incremental_sync_since(since, options)
    }

    /// Sync packages changed since `since` (Unix seconds)
    ///
    /// The cursor advances only once the whole batch has run, to the time
    /// captured before the changelog was requested.
    pub fn incremental_sync_since(
        &mut self,
        since: i64,
        options: SyncOptions,
    ) -> Result<SyncReport> {
        let started = current_timestamp();

        let entries = self.retrying("changelog", || self.remote.changelog_since(since))?;
        let names = changed_packages(&entries);
        info!(
            "{} changelog entries since {} touch {} packages",
            entries.len(),
            since,
            names.len()
        );

        let report = self.sync_packages(&names, options);

        self.index.changelog_since = Some(started);
        self.index.update(self.conn)?;

        self.log_report("Incremental sync", &report);
        Ok(report)
    }

    /// Sync a batch of packages, isolating failures
    pub fn sync_packages(&self, names: &[String], options: SyncOptions) -> SyncReport {
        let mut report = SyncReport::default();
        if let Some(pb) = &self.progress {
            pb.set_length(names.len() as u64);
        }

        for name in names {
            if let Some(pb) = &self.progress {
                pb.set_message(name.clone());
            }

            match self.sync_package(name, options) {
                Ok(outcome) => report.packages.push(outcome),
                Err(e) => {
                    warn!("Failed to sync {}: {}", name, e);
                    report.failures.push(SyncFailure {
                        package: name.clone(),
                        error: e,
                    });
                }
            }

            if let Some(pb) = &self.progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }
        report
    }

    /// Sync one package
    ///
    /// Transport and protocol failures abort the package. A version the
    /// store cannot hold skips that release; a failed download skips that
    /// file. Nothing local is ever deleted.
    pub fn sync_package(&self, name: &str, options: SyncOptions) -> Result<PackageOutcome> {
        validate_package_name(name)?;

        let index_id = self.index.require_id()?;
        let (mut package, created) = Package::get_or_create(self.conn, index_id, name)?;
        let mut outcome = PackageOutcome::new(name, created);

        if !options.update_releases {
            return Ok(outcome);
        }

        let versions = self.retrying("package_releases", || {
            self.remote.package_releases(name, true)
        })?;
        debug!("{} has {} releases upstream", name, versions.len());

        let reconciler = MetadataReconciler::new(self.conn);
        for version in &versions {
            if let Err(e) = Release::validate_version(version) {
                warn!("Skipping {} release: {}", name, e);
                outcome.skipped.push(e.to_string());
                continue;
            }

            let data = self.retrying("release_data", || self.remote.release_data(name, version))?;
            let release = reconciler.reconcile_release(&package, version, &data)?;
            outcome.releases += 1;

            if !options.update_distributions {
                continue;
            }

            let descriptors =
                self.retrying("release_urls", || self.remote.release_urls(name, version))?;
            for desc in &descriptors {
                let (mut dist, _) = reconciler.reconcile_distribution(&release, desc)?;
                if options.mirror_distributions && self.mirror_one(&mut dist, name, &mut outcome)? {
                    outcome.mirrored += 1;
                }
                dist.save(self.conn)?;
                outcome.distributions += 1;
            }
        }

        outcome.state = if options.mirror_distributions && options.update_distributions {
            PackageSyncState::Mirrored
        } else if options.update_distributions {
            PackageSyncState::DistributionsSynced
        } else {
            PackageSyncState::MetadataSynced
        };

        package.updated_from_remote_at = Some(current_timestamp());
        package.update(self.conn)?;

        debug!(
            "{}: {} releases, {} distributions, {} mirrored",
            name, outcome.releases, outcome.distributions, outcome.mirrored
        );
        Ok(outcome)
    }

    /// Scan the simple-index pages of packages for externally hosted files
    ///
    /// Packages not yet known locally are created first. A failing package
    /// is recorded and the batch moves on.
    pub fn scan_external_links(&self, names: &[String], pages: &dyn PageFetcher) -> LinkScanReport {
        let mut report = LinkScanReport::default();
        let scanner = ExternalLinkScanner::new(self.conn, pages);
        if let Some(pb) = &self.progress {
            pb.set_length(names.len() as u64);
        }

        for name in names {
            if let Some(pb) = &self.progress {
                pb.set_message(name.clone());
            }

            let result = validate_package_name(name)
                .and_then(|_| self.index.require_id())
                .and_then(|index_id| Package::get_or_create(self.conn, index_id, name))
                .and_then(|(mut package, _)| scanner.scan_package(&self.index, &mut package));
            match result {
                Ok(scan) => report.scans.push(scan),
                Err(e) => {
                    warn!("Failed to scan {}: {}", name, e);
                    report.failures.push(SyncFailure {
                        package: name.clone(),
                        error: e,
                    });
                }
            }

            if let Some(pb) = &self.progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }
        info!(
            "Link scan of '{}': {} packages, {} external files ({} new), {} failed",
            self.index.slug,
            report.scans.len(),
            report.discovered(),
            report.created(),
            report.failures.len()
        );
        report
    }

    /// Mirror the already-recorded distributions of packages
    ///
    /// Works from the store only; no metadata is requested upstream.
    pub fn mirror_packages(&self, names: &[String], overwrite: bool) -> SyncReport {
        let mut report = SyncReport::default();
        if let Some(pb) = &self.progress {
            pb.set_length(names.len() as u64);
        }

        for name in names {
            match self.mirror_recorded(name, overwrite) {
                Ok(outcome) => report.packages.push(outcome),
                Err(e) => {
                    warn!("Failed to mirror {}: {}", name, e);
                    report.failures.push(SyncFailure {
                        package: name.clone(),
                        error: e,
                    });
                }
            }
            if let Some(pb) = &self.progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }
        report
    }

    fn mirror_recorded(&self, name: &str, overwrite: bool) -> Result<PackageOutcome> {
        let index_id = self.index.require_id()?;
        let package = Package::find(self.conn, index_id, name)?.ok_or_else(|| {
            Error::NotFoundError(format!(
                "Package '{name}' not found in index '{}'",
                self.index.slug
            ))
        })?;

        let mut outcome = PackageOutcome::new(name, false);
        for mut dist in Distribution::list_by_package(self.conn, package.require_id()?)? {
            outcome.distributions += 1;
            if dist.is_hosted_locally() && !overwrite {
                continue;
            }
            match self.store.mirror(self.conn, &mut dist, name, overwrite, true) {
                Ok(result) if result.stored() => outcome.mirrored += 1,
                Ok(_) => {}
                Err(e @ Error::DownloadFailure(_)) => {
                    warn!("Skipping {}: {}", dist.filename, e);
                    outcome.skipped.push(format!("{}: {e}", dist.filename));
                }
                Err(e) => return Err(e),
            }
        }

        outcome.state = PackageSyncState::Mirrored;
        Ok(outcome)
    }

    /// Mirror one distribution during a sync, returning whether a file was stored
    fn mirror_one(
        &self,
        dist: &mut Distribution,
        package_name: &str,
        outcome: &mut PackageOutcome,
    ) -> Result<bool> {
        match self.store.mirror(self.conn, dist, package_name, false, false) {
            Ok(MirrorOutcome::NoSource) => {
                outcome
                    .skipped
                    .push(format!("{}: no download URL", dist.filename));
                Ok(false)
            }
            Ok(result) => Ok(result.stored()),
            Err(e @ Error::DownloadFailure(_)) => {
                warn!("Skipping {}: {}", dist.filename, e);
                outcome.skipped.push(format!("{}: {e}", dist.filename));
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Run `f`, retrying transient failures with linear backoff
    fn retrying<T, F>(&self, what: &str, f: F) -> Result<T>
    where
        F: Fn() -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match f() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt <= self.retry.max_retries => {
                    warn!("{} attempt {} failed: {}, retrying...", what, attempt, e);
                    std::thread::sleep(self.retry.delay * attempt);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn log_report(&self, what: &str, report: &SyncReport) {
        info!(
            "{} of '{}': {} packages ({} new), {} releases, {} distributions, {} mirrored, {} failed",
            what,
            self.index.slug,
            report.packages.len(),
            report.created(),
            report.releases(),
            report.distributions(),
            report.mirrored(),
            report.failures.len()
        );
    }
}
