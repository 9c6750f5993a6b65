// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use commands::Context;
use std::io;

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    if let Commands::Completions { shell } = command {
        clap_complete::generate(shell, &mut Cli::command(), "indexmirror", &mut io::stdout());
        return Ok(());
    }

    let ctx = Context::load(
        cli.global.config.as_deref(),
        cli.global.db_path,
        cli.global.index,
    )?;

    match command {
        Commands::Init => commands::cmd_init(&ctx),
        Commands::IndexAdd {
            slug,
            rpc_url,
            simple_url,
        } => commands::cmd_index_add(&ctx, &slug, &rpc_url, &simple_url),
        Commands::IndexList => commands::cmd_index_list(&ctx),
        Commands::IndexRemove { slug } => commands::cmd_index_remove(&ctx, &slug),
        Commands::Sync { sync } => commands::cmd_sync(&ctx, &sync),
        Commands::Changelog { since, sync } => {
            commands::cmd_changelog(&ctx, since.as_deref(), &sync)
        }
        Commands::SyncPackage { names, sync } => commands::cmd_sync_package(&ctx, &names, &sync),
        Commands::ScanLinks { names, all } => commands::cmd_scan_links(&ctx, &names, all),
        Commands::Mirror {
            names,
            all,
            overwrite,
        } => commands::cmd_mirror(&ctx, &names, all, overwrite),
        Commands::Show { name } => commands::cmd_show(&ctx, &name),
        Commands::Search { pattern } => commands::cmd_search(&ctx, &pattern),
        Commands::Classifiers => commands::cmd_classifiers(&ctx),
        Commands::Completions { .. } => Ok(()),
    }
}
