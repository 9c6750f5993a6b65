// src/commands/index.rs
//! Database initialization and index management commands

use super::Context;
use anyhow::Result;
use indexmirror::db::models::{Package, PackageIndex};
use indexmirror::repository::{add_index, ensure_index, remove_index};
use tracing::info;

/// Create the database and register every configured index
pub fn cmd_init(ctx: &Context) -> Result<()> {
    info!("Initializing database at: {}", ctx.db_path);
    indexmirror::db::init(&ctx.db_path)?;

    let conn = ctx.open_db()?;
    for section in &ctx.config.index {
        let index = ensure_index(&conn, &section.slug, &section.rpc_url, &section.simple_url)?;
        println!("Registered index: {} ({})", index.slug, index.rpc_url);
    }

    println!("Database initialized successfully at: {}", ctx.db_path);
    Ok(())
}

/// Register a new index
pub fn cmd_index_add(ctx: &Context, slug: &str, rpc_url: &str, simple_url: &str) -> Result<()> {
    info!("Adding index: {} ({})", slug, rpc_url);
    for url in [rpc_url, simple_url] {
        url::Url::parse(url).map_err(|e| anyhow::anyhow!("Invalid URL '{}': {}", url, e))?;
    }

    let conn = ctx.open_db()?;
    let index = add_index(
        &conn,
        slug.to_string(),
        rpc_url.to_string(),
        simple_url.to_string(),
    )?;
    println!("Added index: {}", index.slug);
    println!("  RPC URL: {}", index.rpc_url);
    println!("  Simple URL: {}", index.simple_url);
    Ok(())
}

/// List registered indexes
pub fn cmd_index_list(ctx: &Context) -> Result<()> {
    let conn = ctx.open_db()?;
    let indexes = PackageIndex::list_all(&conn)?;

    if indexes.is_empty() {
        println!("No indexes configured");
        return Ok(());
    }

    println!("Indexes:");
    for index in indexes {
        let packages = match index.id {
            Some(id) => Package::count_by_index(&conn, id)?,
            None => 0,
        };
        let sync_status = index
            .last_sync
            .as_ref()
            .map(|ts| format!("synced {}", ts))
            .unwrap_or_else(|| "never synced".to_string());
        println!("  {} ({} packages, {})", index.slug, packages, sync_status);
        println!("      {}", index.rpc_url);
        if let Some(cursor) = &index.changelog_since {
            println!("      changelog cursor: {}", cursor);
        }
    }
    Ok(())
}

/// Remove an index
pub fn cmd_index_remove(ctx: &Context, slug: &str) -> Result<()> {
    info!("Removing index: {}", slug);
    let conn = ctx.open_db()?;
    remove_index(&conn, slug)?;
    println!("Removed index: {}", slug);
    Ok(())
}
