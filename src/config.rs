// src/config.rs
//! Configuration file parsing for the mirror
//!
//! Supports TOML configuration files with the following sections:
//! - [database] - Database location
//! - [storage] - Mirror storage root, optional local mirror, verification
//! - [http] - Request timeout and User-Agent
//! - [sync] - Retry policy and default sync behavior
//! - [[index]] - Upstream indexes to register on `init`
//!
//! Every field has a default, so an empty or missing file is valid.

use crate::db::paths::{DEFAULT_DB_PATH, storage_dir};
use crate::error::{Error, Result};
use crate::repository::{RetryPolicy, SyncOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// TOML configuration file structure
#[derive(Debug, Deserialize)]
pub struct MirrorConfig {
    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub http: HttpSection,

    #[serde(default)]
    pub sync: SyncSection,

    /// Upstream indexes
    #[serde(default = "default_indexes")]
    pub index: Vec<IndexSection>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            database: DatabaseSection::default(),
            storage: StorageSection::default(),
            http: HttpSection::default(),
            sync: SyncSection::default(),
            index: default_indexes(),
        }
    }
}

/// Database configuration section
#[derive(Debug, Deserialize)]
pub struct DatabaseSection {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

/// Storage configuration section
#[derive(Debug, Default, Deserialize)]
pub struct StorageSection {
    /// Root for mirrored files (default: `dists/` beside the database)
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Existing `{package}/{filename}` tree to link files from
    #[serde(default)]
    pub local_mirror: Option<PathBuf>,

    /// Skip MD5 verification of mirrored files
    #[serde(default)]
    pub skip_md5: bool,
}

/// HTTP configuration section
#[derive(Debug, Deserialize)]
pub struct HttpSection {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    crate::repository::USER_AGENT.to_string()
}

/// Sync configuration section
#[derive(Debug, Deserialize)]
pub struct SyncSection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_true")]
    pub update_releases: bool,

    #[serde(default = "default_true")]
    pub update_distributions: bool,

    #[serde(default)]
    pub mirror_distributions: bool,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            update_releases: true,
            update_distributions: true,
            mirror_distributions: false,
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

/// One upstream index
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IndexSection {
    pub slug: String,
    pub rpc_url: String,
    pub simple_url: String,
}

fn default_indexes() -> Vec<IndexSection> {
    vec![IndexSection {
        slug: "pypi".to_string(),
        rpc_url: "https://pypi.org/pypi".to_string(),
        simple_url: "https://pypi.org/simple".to_string(),
    }]
}

impl MirrorConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Load `path` if given, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: MirrorConfig = toml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(Error::ConfigError("database.path is empty".to_string()));
        }

        if self.http.timeout_secs == 0 {
            return Err(Error::ConfigError(
                "http.timeout_secs must be greater than zero".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for index in &self.index {
            if index.slug.trim().is_empty() {
                return Err(Error::ConfigError("index slug is empty".to_string()));
            }
            if !seen.insert(index.slug.as_str()) {
                return Err(Error::ConfigError(format!(
                    "index '{}' is defined more than once",
                    index.slug
                )));
            }
            for url in [&index.rpc_url, &index.simple_url] {
                url::Url::parse(url).map_err(|e| {
                    Error::ConfigError(format!("index '{}': invalid URL '{url}': {e}", index.slug))
                })?;
            }
        }

        Ok(())
    }

    /// Storage root, defaulting to `dists/` beside the database
    pub fn storage_root(&self) -> PathBuf {
        self.storage
            .root
            .clone()
            .unwrap_or_else(|| storage_dir(&self.database.path))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.sync.max_retries,
            delay: Duration::from_millis(self.sync.retry_delay_ms),
        }
    }

    /// Sync options from the `[sync]` section
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            update_releases: self.sync.update_releases,
            update_distributions: self.sync.update_distributions,
            mirror_distributions: self.sync.mirror_distributions,
        }
    }

    /// Look up a configured index by slug
    pub fn find_index(&self, slug: &str) -> Option<&IndexSection> {
        self.index.iter().find(|i| i.slug == slug)
    }

    /// Slug used when none is given on the command line
    pub fn default_index_slug(&self) -> &str {
        self.index.first().map(|i| i.slug.as_str()).unwrap_or("pypi")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = MirrorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.database.path, DEFAULT_DB_PATH);
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
        assert_eq!(config.retry_policy().max_retries, 3);
        assert_eq!(config.sync_options(), SyncOptions::default());
        assert_eq!(config.default_index_slug(), "pypi");
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = MirrorConfig::from_toml("").unwrap();
        assert_eq!(config.index.len(), 1);
        assert!(!config.storage.skip_md5);
        assert!(config.storage.local_mirror.is_none());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[database]
path = "/srv/mirror/mirror.db"

[storage]
root = "/srv/mirror/files"
local_mirror = "/srv/legacy"

[http]
timeout_secs = 10

[sync]
max_retries = 0
retry_delay_ms = 250
mirror_distributions = true

[[index]]
slug = "internal"
rpc_url = "https://pypi.internal.example/pypi"
simple_url = "https://pypi.internal.example/simple"

[[index]]
slug = "pypi"
rpc_url = "https://pypi.org/pypi"
simple_url = "https://pypi.org/simple"
"#;

        let config = MirrorConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.storage_root(), PathBuf::from("/srv/mirror/files"));
        assert_eq!(config.storage.local_mirror, Some(PathBuf::from("/srv/legacy")));
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert_eq!(config.retry_policy().delay, Duration::from_millis(250));
        assert!(config.sync_options().mirror_distributions);
        assert!(config.sync_options().update_releases);
        assert_eq!(config.index.len(), 2);
        assert_eq!(config.default_index_slug(), "internal");
        assert!(config.find_index("pypi").is_some());
        assert!(config.find_index("missing").is_none());
    }

    #[test]
    fn test_invalid_configs() {
        assert!(MirrorConfig::from_toml("[http]\ntimeout_secs = 0\n").is_err());
        assert!(MirrorConfig::from_toml("[database]\npath = \"\"\n").is_err());
        assert!(MirrorConfig::from_toml("not toml at all [").is_err());

        let duplicate = r#"
[[index]]
slug = "pypi"
rpc_url = "https://a.example/pypi"
simple_url = "https://a.example/simple"

[[index]]
slug = "pypi"
rpc_url = "https://b.example/pypi"
simple_url = "https://b.example/simple"
"#;
        assert!(matches!(
            MirrorConfig::from_toml(duplicate),
            Err(Error::ConfigError(_))
        ));

        let bad_url = r#"
[[index]]
slug = "pypi"
rpc_url = "not a url"
simple_url = "https://a.example/simple"
"#;
        assert!(MirrorConfig::from_toml(bad_url).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[sync]\nupdate_distributions = false").unwrap();

        let config = MirrorConfig::load(file.path()).unwrap();
        assert!(!config.sync_options().update_distributions);

        assert!(MirrorConfig::load(Path::new("/nonexistent/indexmirror.toml")).is_err());
        assert!(MirrorConfig::load_or_default(None).is_ok());
    }
}
