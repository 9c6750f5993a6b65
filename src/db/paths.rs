// src/db/paths.rs
//! Centralized path derivation for mirror directories

use std::path::{Path, PathBuf};

/// Default database location
pub const DEFAULT_DB_PATH: &str = "/var/lib/indexmirror/mirror.db";

/// Get the directory containing the database
pub fn db_dir(db_path: &str) -> PathBuf {
    std::env::var("INDEXMIRROR_DB_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            Path::new(db_path)
                .parent()
                .unwrap_or(Path::new("/var/lib/indexmirror"))
                .to_path_buf()
        })
}

/// Get the default storage root for mirrored distribution files
pub fn storage_dir(db_path: &str) -> PathBuf {
    db_dir(db_path).join("dists")
}

/// Storage-relative path for a distribution file
///
/// Files are bucketed by the lower-cased first character of the package name
/// so no single directory grows to hold every package.
pub fn distribution_relpath(package_name: &str, filename: &str) -> PathBuf {
    let bucket = package_name
        .chars()
        .next()
        .map(|c| c.to_ascii_lowercase().to_string())
        .unwrap_or_else(|| "_".to_string());
    PathBuf::from(bucket).join(package_name).join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_dir() {
        if std::env::var("INDEXMIRROR_DB_DIR").is_ok() {
            return;
        }
        assert_eq!(
            storage_dir("/var/lib/indexmirror/mirror.db"),
            PathBuf::from("/var/lib/indexmirror/dists")
        );
    }

    #[test]
    fn test_distribution_relpath() {
        assert_eq!(
            distribution_relpath("Django", "Django-1.3.tar.gz"),
            PathBuf::from("d/Django/Django-1.3.tar.gz")
        );
        assert_eq!(
            distribution_relpath("", "x.tar.gz"),
            PathBuf::from("_/x.tar.gz")
        );
    }
}
