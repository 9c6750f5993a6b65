// src/hash.rs

//! MD5 digests for distribution files
//!
//! The upstream index publishes an MD5 digest for every file it hosts and
//! simple-index links carry one in their `#md5=` fragment. Mirrored and
//! uploaded files are checked against it before a record points at them.

use md5::{Digest, Md5};
use std::fmt;
use std::io::{self, Read};
use std::path::Path;

/// Length of a hex-encoded MD5 digest
pub const MD5_HEX_LEN: usize = 32;

/// Verification result error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyError {
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "md5 mismatch: expected {}, got {}",
            self.expected, self.actual
        )
    }
}

impl std::error::Error for VerifyError {}

/// Compute the hex MD5 digest of a byte slice
pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute the hex MD5 digest of a reader, streaming in 8 KB chunks
pub fn md5_reader<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Md5::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Whether a string looks like a hex MD5 digest
pub fn is_md5_hex(value: &str) -> bool {
    value.len() == MD5_HEX_LEN && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Verify bytes match an expected MD5 digest
///
/// An empty expectation always passes: not every upstream record carries a
/// digest, and files without one are accepted as-is.
pub fn verify_md5(data: &[u8], expected: &str) -> Result<(), VerifyError> {
    if expected.is_empty() {
        return Ok(());
    }

    let actual = md5_hex(data);
    if actual == expected.to_lowercase() {
        Ok(())
    } else {
        Err(VerifyError {
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Verify a file on disk matches an expected MD5 digest
pub fn verify_file_md5(path: &Path, expected: &str) -> Result<(), VerifyError> {
    let mut file = std::fs::File::open(path).map_err(|_| VerifyError {
        expected: expected.to_string(),
        actual: "<file read error>".to_string(),
    })?;

    let actual = md5_reader(&mut file).map_err(|_| VerifyError {
        expected: expected.to_string(),
        actual: "<hash read error>".to_string(),
    })?;

    if expected.is_empty() || actual == expected.to_lowercase() {
        Ok(())
    } else {
        Err(VerifyError {
            expected: expected.to_string(),
            actual,
        })
    }
}

impl From<VerifyError> for crate::error::Error {
    fn from(err: VerifyError) -> Self {
        crate::error::Error::ChecksumMismatch {
            expected: err.expected,
            actual: err.actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_md5_known_value() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            md5_hex(b"hello world"),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
    }

    #[test]
    fn test_md5_reader_matches_slice() {
        let data = vec![7u8; 20_000];
        let mut cursor = io::Cursor::new(data.clone());
        assert_eq!(md5_reader(&mut cursor).unwrap(), md5_hex(&data));
    }

    #[test]
    fn test_verify_md5() {
        assert!(verify_md5(b"hello world", "5eb63bbbe01eeed093cb22bb8f5acdc3").is_ok());
        // Upper-case digests are accepted
        assert!(verify_md5(b"hello world", "5EB63BBBE01EEED093CB22BB8F5ACDC3").is_ok());
        assert!(verify_md5(b"anything", "").is_ok());

        let err = verify_md5(b"hello", "5eb63bbbe01eeed093cb22bb8f5acdc3").unwrap_err();
        assert_eq!(err.actual, md5_hex(b"hello"));
    }

    #[test]
    fn test_verify_file_md5() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();

        assert!(verify_file_md5(file.path(), "5eb63bbbe01eeed093cb22bb8f5acdc3").is_ok());
        assert!(verify_file_md5(file.path(), "00000000000000000000000000000000").is_err());
    }

    #[test]
    fn test_is_md5_hex() {
        assert!(is_md5_hex("5eb63bbbe01eeed093cb22bb8f5acdc3"));
        assert!(!is_md5_hex("5eb63bbb"));
        assert!(!is_md5_hex("zzb63bbbe01eeed093cb22bb8f5acdc3"));
    }
}
