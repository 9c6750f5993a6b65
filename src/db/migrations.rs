// src/db/migrations.rs
//! Database migration implementations
//!
//! Each function upgrades the schema by exactly one version.

use crate::error::Result;
use rusqlite::Connection;
use tracing::{debug, info};

/// Initial schema - Version 1
///
/// Creates the record tree:
/// - package_indexes: Upstream sources (RPC endpoint, simple index)
/// - packages: Package names per index
/// - releases: Versions with their multi-valued metadata map
/// - distributions: Distributable files per release
/// - classifiers: Every classifier string seen on a release
pub fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE package_indexes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            slug TEXT NOT NULL UNIQUE,
            rpc_url TEXT NOT NULL,
            simple_url TEXT NOT NULL,
            last_sync TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE packages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            index_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            auto_hide INTEGER NOT NULL DEFAULT 1,
            updated_from_remote_at TEXT,
            parsed_external_links_at TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(index_id, name),
            FOREIGN KEY (index_id) REFERENCES package_indexes(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_packages_name ON packages(name);

        CREATE TABLE releases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            package_id INTEGER NOT NULL,
            version TEXT NOT NULL CHECK(length(version) <= 128),
            metadata_version TEXT NOT NULL DEFAULT '1.0',
            package_info TEXT NOT NULL DEFAULT '{}',
            hidden INTEGER NOT NULL DEFAULT 0,
            provenance TEXT NOT NULL DEFAULT 'remote'
                CHECK(provenance IN ('remote', 'external', 'upload')),
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(package_id, version),
            FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_releases_package_id ON releases(package_id);

        CREATE TABLE distributions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            release_id INTEGER NOT NULL,
            filename TEXT NOT NULL DEFAULT '',
            file TEXT,
            url TEXT,
            size INTEGER,
            md5_digest TEXT NOT NULL DEFAULT '',
            filetype TEXT NOT NULL,
            pyversion TEXT NOT NULL DEFAULT '',
            comment TEXT NOT NULL DEFAULT '',
            signature TEXT NOT NULL DEFAULT '',
            uploaded_at TEXT,
            provenance TEXT NOT NULL DEFAULT 'remote'
                CHECK(provenance IN ('remote', 'external', 'upload')),
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(release_id, filetype, pyversion),
            FOREIGN KEY (release_id) REFERENCES releases(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_distributions_release_id ON distributions(release_id);
        CREATE INDEX idx_distributions_filename ON distributions(filename);

        CREATE TABLE classifiers (
            name TEXT PRIMARY KEY
        );
        ",
    )?;

    info!("Schema version 1 created successfully");
    Ok(())
}

/// Schema Version 2: Track when a distribution was mirrored
pub fn migrate_v2(conn: &Connection) -> Result<()> {
    debug!("Migrating to schema version 2");

    conn.execute_batch(
        "
        ALTER TABLE distributions ADD COLUMN mirrored_at TEXT;
        ",
    )?;

    info!("Schema version 2 applied successfully");
    Ok(())
}

/// Schema Version 3: Separate changelog cursor per index
///
/// `last_sync` records full syncs only; incremental syncs advance their own
/// cursor so a failed full sync never rewinds the changelog position.
pub fn migrate_v3(conn: &Connection) -> Result<()> {
    debug!("Migrating to schema version 3");

    conn.execute_batch(
        "
        ALTER TABLE package_indexes ADD COLUMN changelog_since TEXT;
        ",
    )?;

    info!("Schema version 3 applied successfully");
    Ok(())
}
