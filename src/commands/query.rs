// src/commands/query.rs
//! Read-only inspection of the mirror store

use super::Context;
use anyhow::Result;
use indexmirror::db::models::{Distribution, Release, list_classifiers};
use indexmirror::repository::{require_package, search_packages};

/// Show a package with its releases and distribution files
pub fn cmd_show(ctx: &Context, name: &str) -> Result<()> {
    let conn = ctx.open_db()?;
    let index = ctx.open_index(&conn)?;
    let package = require_package(&conn, &index, name)?;
    let package_id = package.require_id()?;

    println!("Package: {} (index: {})", package.name, index.slug);
    if let Some(ts) = &package.updated_from_remote_at {
        println!("  Updated from remote: {}", ts);
    }
    if let Some(ts) = &package.parsed_external_links_at {
        println!("  External links scanned: {}", ts);
    }

    let releases = Release::list_by_package(&conn, package_id)?;
    if releases.is_empty() {
        println!("  No releases recorded");
        return Ok(());
    }

    for release in &releases {
        let hidden = if release.hidden { " [hidden]" } else { "" };
        println!(
            "  {} ({}){}",
            release.release_name(&package.name),
            release.provenance.as_str(),
            hidden
        );
        if !release.summary().is_empty() {
            println!("      {}", release.summary());
        }

        for dist in Distribution::list_by_release(&conn, release.require_id()?)? {
            let location = if dist.is_hosted_locally() { "local" } else { "remote" };
            println!(
                "      {} [{}, {}, {}]",
                dist.filename,
                dist.display_filetype(),
                dist.pyversion,
                location
            );
            if !dist.md5_digest.is_empty() {
                println!("          md5: {}", dist.md5_digest);
            }
        }
    }
    Ok(())
}

/// Search package names
pub fn cmd_search(ctx: &Context, pattern: &str) -> Result<()> {
    let conn = ctx.open_db()?;
    let packages = search_packages(&conn, &ctx.index_slug, pattern)?;

    if packages.is_empty() {
        println!("No packages found matching '{}'", pattern);
        return Ok(());
    }

    println!("Found {} packages:", packages.len());
    for package in packages {
        println!("  {}", package.name);
    }
    Ok(())
}

/// List known trove classifiers
pub fn cmd_classifiers(ctx: &Context) -> Result<()> {
    let conn = ctx.open_db()?;
    for classifier in list_classifiers(&conn)? {
        println!("{}", classifier);
    }
    Ok(())
}
