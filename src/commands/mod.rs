// src/commands/mod.rs
//! Command handlers for the indexmirror CLI

mod index;
mod progress;
mod query;
mod sync;

use anyhow::{Context as _, Result};
use indexmirror::db::models::PackageIndex;
use indexmirror::repository::{ArtifactStore, DirectoryMirror, HttpClient, require_index};
use indexmirror::MirrorConfig;
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

pub use index::{cmd_index_add, cmd_index_list, cmd_index_remove, cmd_init};
pub use query::{cmd_classifiers, cmd_search, cmd_show};
pub use sync::{cmd_changelog, cmd_mirror, cmd_scan_links, cmd_sync, cmd_sync_package};

/// Settings resolved from the configuration file and global flags
pub struct Context {
    pub config: MirrorConfig,
    pub db_path: String,
    pub index_slug: String,
}

impl Context {
    /// Load configuration and apply command-line overrides
    pub fn load(
        config_path: Option<&Path>,
        db_path: Option<String>,
        index: Option<String>,
    ) -> Result<Self> {
        let mut config = MirrorConfig::load_or_default(config_path)?;
        if let Some(db_path) = db_path {
            config.database.path = db_path;
        }

        let index_slug = index.unwrap_or_else(|| config.default_index_slug().to_string());
        debug!(
            "Using database {} and index '{}'",
            config.database.path, index_slug
        );

        Ok(Self {
            db_path: config.database.path.clone(),
            config,
            index_slug,
        })
    }

    pub fn open_db(&self) -> Result<Connection> {
        Ok(indexmirror::db::open(&self.db_path)?)
    }

    /// The selected index, which must already be registered
    pub fn open_index(&self, conn: &Connection) -> Result<PackageIndex> {
        Ok(require_index(conn, &self.index_slug)?)
    }

    pub fn http_client(&self) -> Result<HttpClient> {
        HttpClient::with_settings(self.config.http_timeout(), &self.config.http.user_agent)
            .context("Failed to create HTTP client")
    }

    /// Artifact store rooted at the configured storage directory
    pub fn artifact_store(&self, http: HttpClient) -> ArtifactStore {
        let mut store = ArtifactStore::new(self.config.storage_root(), Box::new(http))
            .with_md5_verification(!self.config.storage.skip_md5);
        if let Some(local) = &self.config.storage.local_mirror {
            store = store.with_local_mirror(Box::new(DirectoryMirror::new(local)));
        }
        store
    }
}
