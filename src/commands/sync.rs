// src/commands/sync.rs
//! Sync, link-scan and mirror commands

use super::Context;
use super::progress::batch_progress;
use crate::cli::SyncArgs;
use anyhow::{Result, bail};
use indexmirror::db::models::Package;
use indexmirror::repository::{SyncOrchestrator, SyncReport, XmlRpcIndex};
use indexmirror::timestamp::parse_timestamp;
use tracing::info;

/// Print a run summary and fail if any package failed
fn finish(what: &str, report: &SyncReport) -> Result<()> {
    println!(
        "{}: {} packages ({} new), {} releases, {} distributions, {} files mirrored",
        what,
        report.packages.len(),
        report.created(),
        report.releases(),
        report.distributions(),
        report.mirrored()
    );

    for outcome in report.packages.iter().filter(|p| !p.skipped.is_empty()) {
        for reason in &outcome.skipped {
            println!("  skipped in {}: {}", outcome.name, reason);
        }
    }

    if report.is_clean() {
        return Ok(());
    }

    for failure in &report.failures {
        println!("  FAILED {}: {}", failure.package, failure.error);
    }
    bail!("{} packages failed", report.failures.len())
}

/// Full sync of the selected index
pub fn cmd_sync(ctx: &Context, args: &SyncArgs) -> Result<()> {
    let conn = ctx.open_db()?;
    let index = ctx.open_index(&conn)?;
    let http = ctx.http_client()?;
    let remote = XmlRpcIndex::new(index.rpc_url.clone(), http.clone());
    let store = ctx.artifact_store(http);

    let options = args.apply(ctx.config.sync_options());
    info!("Full sync of '{}' with {:?}", index.slug, options);

    let mut orchestrator = SyncOrchestrator::new(&conn, index, &remote, &store)
        .with_retry(ctx.config.retry_policy())
        .with_progress(batch_progress("sync"));
    let report = orchestrator.full_sync(options)?;
    finish("Full sync", &report)
}

fn parse_since(value: &str) -> Result<i64> {
    if let Ok(seconds) = value.trim().parse::<i64>() {
        return Ok(seconds);
    }
    Ok(parse_timestamp(value.trim())?)
}

/// Incremental sync from the changelog
pub fn cmd_changelog(ctx: &Context, since: Option<&str>, args: &SyncArgs) -> Result<()> {
    let conn = ctx.open_db()?;
    let index = ctx.open_index(&conn)?;
    let http = ctx.http_client()?;
    let remote = XmlRpcIndex::new(index.rpc_url.clone(), http.clone());
    let store = ctx.artifact_store(http);

    let options = args.apply(ctx.config.sync_options());
    let mut orchestrator = SyncOrchestrator::new(&conn, index, &remote, &store)
        .with_retry(ctx.config.retry_policy())
        .with_progress(batch_progress("changelog"));

    let report = match since {
        Some(value) => orchestrator.incremental_sync_since(parse_since(value)?, options)?,
        None => orchestrator.incremental_sync(options)?,
    };
    finish("Incremental sync", &report)
}

/// Sync named packages
pub fn cmd_sync_package(ctx: &Context, names: &[String], args: &SyncArgs) -> Result<()> {
    let conn = ctx.open_db()?;
    let index = ctx.open_index(&conn)?;
    let http = ctx.http_client()?;
    let remote = XmlRpcIndex::new(index.rpc_url.clone(), http.clone());
    let store = ctx.artifact_store(http);

    let options = args.apply(ctx.config.sync_options());
    let orchestrator = SyncOrchestrator::new(&conn, index, &remote, &store)
        .with_retry(ctx.config.retry_policy());
    let report = orchestrator.sync_packages(names, options);
    finish("Package sync", &report)
}

fn package_names(ctx: &Context, names: &[String], all: bool) -> Result<Vec<String>> {
    if !all {
        return Ok(names.to_vec());
    }
    let conn = ctx.open_db()?;
    let index = ctx.open_index(&conn)?;
    let packages = Package::list_by_index(&conn, index.require_id()?)?;
    Ok(packages.into_iter().map(|p| p.name).collect())
}

/// Scan simple-index pages for externally hosted files
pub fn cmd_scan_links(ctx: &Context, names: &[String], all: bool) -> Result<()> {
    let names = package_names(ctx, names, all)?;
    let conn = ctx.open_db()?;
    let index = ctx.open_index(&conn)?;
    let http = ctx.http_client()?;
    let remote = XmlRpcIndex::new(index.rpc_url.clone(), http.clone());
    let store = ctx.artifact_store(http.clone());

    let orchestrator = SyncOrchestrator::new(&conn, index, &remote, &store)
        .with_progress(batch_progress("scan-links"));
    let report = orchestrator.scan_external_links(&names, &http);

    for scan in &report.scans {
        println!(
            "{}: {} external files ({} new, {} updated), {} ignored",
            scan.package, scan.discovered, scan.created, scan.updated, scan.ignored
        );
    }
    println!(
        "Link scan: {} packages, {} external files ({} new)",
        report.scans.len(),
        report.discovered(),
        report.created()
    );

    if report.is_clean() {
        return Ok(());
    }
    for failure in &report.failures {
        println!("  FAILED {}: {}", failure.package, failure.error);
    }
    bail!("{} packages failed", report.failures.len())
}

/// Fetch files for recorded distributions
pub fn cmd_mirror(ctx: &Context, names: &[String], all: bool, overwrite: bool) -> Result<()> {
    let names = package_names(ctx, names, all)?;
    let conn = ctx.open_db()?;
    let index = ctx.open_index(&conn)?;
    let http = ctx.http_client()?;
    let remote = XmlRpcIndex::new(index.rpc_url.clone(), http.clone());
    let store = ctx.artifact_store(http);

    let orchestrator = SyncOrchestrator::new(&conn, index, &remote, &store)
        .with_retry(ctx.config.retry_policy())
        .with_progress(batch_progress("mirror"));
    let report = orchestrator.mirror_packages(&names, overwrite);
    finish("Mirror", &report)
}
