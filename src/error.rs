// src/error.rs

//! Error types for the mirror
//!
//! Every fallible operation in the library returns [`Result`]. The
//! synchronization engine inspects the variant to decide whether a failure
//! aborts the run, the current package, a single release, or a single file.

use thiserror::Error;

/// Errors produced by the mirror
#[derive(Error, Debug)]
pub enum Error {
    /// Package name cannot be encoded for the upstream protocol
    #[error("Invalid package name '{0}'")]
    InvalidPackageName(String),

    /// Transport failure talking to the upstream index (connect, timeout, HTTP status)
    #[error("Remote index unavailable: {0}")]
    RemoteUnavailable(String),

    /// Upstream answered with something we could not interpret
    #[error("Remote protocol error: {0}")]
    RemoteProtocolError(String),

    /// Fetching a distribution file failed
    #[error("Download failed: {0}")]
    DownloadFailure(String),

    /// A file with the same name or identity already exists for the release
    #[error("{0}")]
    DuplicateUpload(String),

    /// Version string rejected before it reaches the store
    #[error("Invalid version '{0}'")]
    InvalidVersion(String),

    /// Upstream timestamp in an unexpected format
    #[error("Unparsable timestamp '{0}'")]
    UnparsableTimestamp(String),

    /// Downloaded or uploaded bytes do not match the published digest
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    IoError(String),

    /// Local parse failure (stored JSON, timestamps in the store, arguments)
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Configuration file could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Record lookup failed
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Record already exists
    #[error("Conflict: {0}")]
    ConflictError(String),

    /// Component could not be initialized
    #[error("Initialization error: {0}")]
    InitError(String),
}

impl Error {
    /// Whether the failure is a transient transport problem worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::RemoteUnavailable(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
