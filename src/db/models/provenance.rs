// src/db/models/provenance.rs

//! Where a release or distribution record came from

use std::str::FromStr;

/// Origin of a release or distribution record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provenance {
    /// Primary RPC feed of the upstream index
    #[default]
    Remote,
    /// Discovered by scanning external links on the simple index
    External,
    /// Submitted directly to this mirror
    Upload,
}

impl Provenance {
    pub fn as_str(&self) -> &str {
        match self {
            Provenance::Remote => "remote",
            Provenance::External => "external",
            Provenance::Upload => "upload",
        }
    }
}

impl FromStr for Provenance {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "remote" => Ok(Provenance::Remote),
            "external" => Ok(Provenance::External),
            "upload" => Ok(Provenance::Upload),
            _ => Err(format!("Invalid provenance: {s}")),
        }
    }
}

/// Convert a stored provenance column, reporting the column index on failure
pub(crate) fn provenance_from_column(idx: usize, value: String) -> rusqlite::Result<Provenance> {
    value.parse::<Provenance>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })
}
