// src/db/models/mod.rs

//! Data models for mirror database entities
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating, reading, updating, and deleting records.
//! Ownership is a strict tree: index → package → release → distribution.

mod classifier;
mod distribution;
mod package;
mod package_index;
mod package_info;
mod provenance;
mod release;

pub use classifier::{ensure_classifier, ensure_classifiers, list_classifiers};
pub use distribution::Distribution;
pub use package::Package;
pub use package_index::PackageIndex;
pub use package_info::{CLASSIFIER_KEY, PackageInfo};
pub use provenance::Provenance;
pub use release::{DEFAULT_METADATA_VERSION, MAX_VERSION_LEN, Release};
