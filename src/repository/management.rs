// src/repository/management.rs

//! Index management operations
//!
//! Functions for registering, removing and looking up upstream indexes.

use crate::db::models::{Package, PackageIndex};
use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::info;

/// Register a new upstream index
pub fn add_index(
    conn: &Connection,
    slug: String,
    rpc_url: String,
    simple_url: String,
) -> Result<PackageIndex> {
    if PackageIndex::find_by_slug(conn, &slug)?.is_some() {
        return Err(Error::ConflictError(format!("Index '{slug}' already exists")));
    }

    let mut index = PackageIndex::new(slug, rpc_url, simple_url);
    index.insert(conn)?;

    info!("Added index: {} ({})", index.slug, index.rpc_url);
    Ok(index)
}

/// Register an index, or refresh the URLs of an existing one
pub fn ensure_index(
    conn: &Connection,
    slug: &str,
    rpc_url: &str,
    simple_url: &str,
) -> Result<PackageIndex> {
    match PackageIndex::find_by_slug(conn, slug)? {
        Some(mut index) => {
            if index.rpc_url != rpc_url || index.simple_url != simple_url {
                index.rpc_url = rpc_url.to_string();
                index.simple_url = simple_url.to_string();
                index.update(conn)?;
                info!("Updated index URLs: {}", slug);
            }
            Ok(index)
        }
        None => add_index(
            conn,
            slug.to_string(),
            rpc_url.to_string(),
            simple_url.to_string(),
        ),
    }
}

/// Remove an index and everything mirrored from it
pub fn remove_index(conn: &Connection, slug: &str) -> Result<()> {
    let index = require_index(conn, slug)?;
    PackageIndex::delete(conn, index.require_id()?)?;
    info!("Removed index: {}", slug);
    Ok(())
}

/// Look up an index by slug, failing if it is not registered
pub fn require_index(conn: &Connection, slug: &str) -> Result<PackageIndex> {
    PackageIndex::find_by_slug(conn, slug)?
        .ok_or_else(|| Error::NotFoundError(format!("Index '{slug}' not found")))
}

/// Look up a mirrored package, failing if it is unknown
pub fn require_package(conn: &Connection, index: &PackageIndex, name: &str) -> Result<Package> {
    Package::find(conn, index.require_id()?, name)?.ok_or_else(|| {
        Error::NotFoundError(format!("Package '{name}' not found in index '{}'", index.slug))
    })
}

/// Search package names on an index
pub fn search_packages(conn: &Connection, slug: &str, pattern: &str) -> Result<Vec<Package>> {
    let index = require_index(conn, slug)?;
    Package::search(conn, index.require_id()?, pattern)
}
