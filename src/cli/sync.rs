// src/cli/sync.rs
//! Options shared by the sync commands

use clap::Args;
use indexmirror::SyncOptions;

#[derive(Args, Debug, Clone, Default)]
pub struct SyncArgs {
    /// Also mirror distribution files into storage
    #[arg(long)]
    pub mirror: bool,

    /// Record package names only; skip releases and files
    #[arg(long)]
    pub names_only: bool,

    /// Skip distribution metadata
    #[arg(long)]
    pub no_distributions: bool,
}

impl SyncArgs {
    /// Apply command-line overrides to configured defaults
    pub fn apply(&self, mut options: SyncOptions) -> SyncOptions {
        if self.mirror {
            options.mirror_distributions = true;
        }
        if self.no_distributions {
            options.update_distributions = false;
            options.mirror_distributions = false;
        }
        if self.names_only {
            options = SyncOptions::names_only();
        }
        options
    }
}
