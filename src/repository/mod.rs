// src/repository/mod.rs

//! Upstream index synchronization
//!
//! This module provides functionality for:
//! - Talking to an upstream index over XML-RPC
//! - Reconciling upstream metadata into the local store
//! - Mirroring distribution files into local storage
//! - Discovering externally hosted files from simple-index pages
//! - Orchestrating full and incremental sync runs

mod client;
mod filename;
mod links;
mod management;
mod mirror;
mod reconcile;
mod remote;
mod sync;

pub mod xmlrpc;

// Re-export main types and functions
pub use client::{HTTP_TIMEOUT, HttpClient, USER_AGENT};
pub use filename::{ParsedFilename, filetype_for, parse_filename};
pub use links::{ExternalLinkScanner, PageFetcher, ScanReport, extract_hrefs};
pub use management::{
    add_index, ensure_index, remove_index, require_index, require_package, search_packages,
};
pub use mirror::{
    ArtifactStore, DirectoryMirror, FileFetcher, LocalMirror, MirrorOutcome, write_atomic,
};
pub use reconcile::{ExternalFile, MetadataReconciler, ReconcileAction, package_info_from};
pub use remote::{
    ChangelogEntry, DistributionDescriptor, ReleaseData, RemoteIndex, XmlRpcIndex,
    validate_package_name,
};
pub use sync::{
    LinkScanReport, PackageOutcome, PackageSyncState, RetryPolicy, SyncFailure, SyncOptions,
    SyncOrchestrator, SyncReport, changed_packages,
};
