// src/lib.rs

//! indexmirror - self-hosted mirror of a Python package index
//!
//! Keeps a local record store of packages, releases and distribution files in
//! step with an upstream index and optionally mirrors the files themselves.
//!
//! # Architecture
//!
//! - Database-first: all state in SQLite, one tree per upstream index
//! - Upserts only: sync creates or replaces records, never deletes them
//! - Two-phase files: metadata is recorded first, bytes are mirrored later
//! - Per-package isolation: one package failing never aborts a run

pub mod config;
pub mod db;
mod error;
pub mod hash;
pub mod repository;
pub mod submit;
pub mod timestamp;

pub use config::MirrorConfig;
pub use error::{Error, Result};
pub use repository::{
    ArtifactStore, ExternalLinkScanner, HttpClient, MetadataReconciler, RemoteIndex,
    SyncOptions, SyncOrchestrator, SyncReport, XmlRpcIndex,
};
pub use submit::{Registration, Upload, register_release, upload_distribution};
