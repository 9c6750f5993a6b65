// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: configuration file
fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("PATH")
        .env("INDEXMIRROR_CONFIG")
        .global(true)
        .help("Path to the TOML configuration file")
}

/// Common argument: database path
fn db_path_arg() -> Arg {
    Arg::new("db_path")
        .short('d')
        .long("db-path")
        .value_name("PATH")
        .global(true)
        .help("Path to the database file (overrides the configuration)")
}

/// Common argument: index slug
fn index_arg() -> Arg {
    Arg::new("index")
        .short('i')
        .long("index")
        .value_name("SLUG")
        .global(true)
        .help("Index slug to operate on (default: first configured index)")
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .action(ArgAction::SetTrue)
        .help(help)
}

fn sync_args(cmd: Command) -> Command {
    cmd.arg(flag("mirror", "Also mirror distribution files into storage"))
        .arg(flag("names-only", "Record package names only; skip releases and files"))
        .arg(flag("no-distributions", "Skip distribution metadata"))
}

fn names_arg() -> Arg {
    Arg::new("names").num_args(1..).help("Package names")
}

fn build_cli() -> Command {
    Command::new("indexmirror")
        .version(env!("CARGO_PKG_VERSION"))
        .author("indexmirror contributors")
        .about("Self-hosted mirror of a Python package index")
        .subcommand_required(false)
        .arg(config_arg())
        .arg(db_path_arg())
        .arg(index_arg())
        .subcommand(
            Command::new("init").about("Initialize the database and register configured indexes"),
        )
        .subcommand(
            Command::new("index-add")
                .about("Register an upstream index")
                .arg(Arg::new("slug").required(true).help("Short name for the index"))
                .arg(Arg::new("rpc_url").required(true).help("XML-RPC endpoint URL"))
                .arg(Arg::new("simple_url").required(true).help("Simple index base URL")),
        )
        .subcommand(Command::new("index-list").about("List registered indexes"))
        .subcommand(
            Command::new("index-remove")
                .about("Remove an index and everything mirrored from it")
                .arg(Arg::new("slug").required(true).help("Index slug")),
        )
        .subcommand(sync_args(
            Command::new("sync").about("Full sync: every package the index lists"),
        ))
        .subcommand(sync_args(
            Command::new("changelog")
                .about("Incremental sync: packages changed since the changelog cursor")
                .arg(
                    Arg::new("since")
                        .long("since")
                        .value_name("TIME")
                        .help("Start point instead of the stored cursor (RFC 3339 or Unix seconds)"),
                ),
        ))
        .subcommand(sync_args(
            Command::new("sync-package")
                .about("Sync specific packages")
                .arg(names_arg().required(true)),
        ))
        .subcommand(
            Command::new("scan-links")
                .about("Scan simple-index pages for externally hosted files")
                .arg(names_arg())
                .arg(flag("all", "Scan every known package of the index")),
        )
        .subcommand(
            Command::new("mirror")
                .about("Fetch files for distributions already in the store")
                .arg(names_arg())
                .arg(flag("all", "Mirror every known package of the index"))
                .arg(flag("overwrite", "Fetch again even when a local file is recorded")),
        )
        .subcommand(
            Command::new("show")
                .about("Show a package with its releases and files")
                .arg(Arg::new("name").required(true).help("Package name")),
        )
        .subcommand(
            Command::new("search")
                .about("Search package names")
                .arg(Arg::new("pattern").required(true).help("Substring to match")),
        )
        .subcommand(Command::new("classifiers").about("List known trove classifiers"))
        .subcommand(
            Command::new("completions")
                .about("Generate shell completions")
                .arg(Arg::new("shell").required(true).help("Shell to generate completions for")),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("indexmirror.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
