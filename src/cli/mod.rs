// src/cli/mod.rs
//! CLI definitions for indexmirror
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! Commands:
//! - `init` - Create the database and register configured indexes
//! - `index-add` / `index-list` / `index-remove` - Manage upstream indexes
//! - `sync` - Full sync of an index
//! - `changelog` - Incremental sync from the changelog cursor
//! - `sync-package` - Sync named packages
//! - `scan-links` - Record externally hosted files
//! - `mirror` - Fetch files of already-recorded distributions
//! - `show` / `search` / `classifiers` - Inspect the store

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

mod sync;

pub use sync::SyncArgs;

#[derive(Parser)]
#[command(name = "indexmirror")]
#[command(author = "indexmirror contributors")]
#[command(version)]
#[command(about = "Self-hosted mirror of a Python package index", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options accepted by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, env = "INDEXMIRROR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the database file (overrides the configuration)
    #[arg(short, long, global = true)]
    pub db_path: Option<String>,

    /// Index slug to operate on (default: first configured index)
    #[arg(short, long, global = true)]
    pub index: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and register configured indexes
    Init,

    /// Register an upstream index
    IndexAdd {
        /// Short name for the index
        slug: String,

        /// XML-RPC endpoint URL
        rpc_url: String,

        /// Simple index base URL
        simple_url: String,
    },

    /// List registered indexes
    IndexList,

    /// Remove an index and everything mirrored from it
    IndexRemove {
        /// Index slug
        slug: String,
    },

    /// Full sync: every package the index lists
    Sync {
        #[command(flatten)]
        sync: SyncArgs,
    },

    /// Incremental sync: packages changed since the changelog cursor
    Changelog {
        /// Start point instead of the stored cursor (RFC 3339 or Unix seconds)
        #[arg(long)]
        since: Option<String>,

        #[command(flatten)]
        sync: SyncArgs,
    },

    /// Sync specific packages
    SyncPackage {
        /// Package names
        #[arg(required = true)]
        names: Vec<String>,

        #[command(flatten)]
        sync: SyncArgs,
    },

    /// Scan simple-index pages for externally hosted files
    ScanLinks {
        /// Package names
        #[arg(required_unless_present = "all")]
        names: Vec<String>,

        /// Scan every known package of the index
        #[arg(long, conflicts_with = "names")]
        all: bool,
    },

    /// Fetch files for distributions already in the store
    Mirror {
        /// Package names
        #[arg(required_unless_present = "all")]
        names: Vec<String>,

        /// Mirror every known package of the index
        #[arg(long, conflicts_with = "names")]
        all: bool,

        /// Fetch again even when a local file is recorded
        #[arg(long)]
        overwrite: bool,
    },

    /// Show a package with its releases and files
    Show {
        /// Package name
        name: String,
    },

    /// Search package names
    Search {
        /// Substring to match
        pattern: String,
    },

    /// List known trove classifiers
    Classifiers,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "indexmirror",
            "sync-package",
            "Django",
            "django-filer",
            "--index",
            "internal",
            "--mirror",
        ])
        .unwrap();

        assert_eq!(cli.global.index.as_deref(), Some("internal"));
        match cli.command {
            Some(Commands::SyncPackage { names, sync }) => {
                assert_eq!(names, vec!["Django", "django-filer"]);
                assert!(sync.mirror);
            }
            _ => panic!("expected sync-package"),
        }
    }

    #[test]
    fn test_scan_links_requires_names_or_all() {
        assert!(Cli::try_parse_from(["indexmirror", "scan-links"]).is_err());
        assert!(Cli::try_parse_from(["indexmirror", "scan-links", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["indexmirror", "scan-links", "foo", "--all"]).is_err());
    }
}
