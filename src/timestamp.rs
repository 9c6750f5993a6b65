// src/timestamp.rs

//! Timestamp helpers
//!
//! The store keeps every timestamp as text. Values written by the mirror are
//! RFC 3339 in UTC; SQLite defaults (`CURRENT_TIMESTAMP`) use
//! `YYYY-MM-DD HH:MM:SS`. Both forms are accepted when reading back.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Format of `upload_time` values in upstream distribution descriptors
pub const UPSTREAM_TIME_FORMAT: &str = "%Y%m%dT%H:%M:%S";

const SQLITE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Get current timestamp as ISO 8601 string
pub fn current_timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// Format Unix seconds as an RFC 3339 string
pub fn format_unix(seconds: i64) -> String {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or_else(Utc::now)
        .to_rfc3339()
}

/// Parse a stored timestamp to Unix seconds
pub fn parse_timestamp(timestamp: &str) -> Result<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return Ok(dt.timestamp());
    }

    NaiveDateTime::parse_from_str(timestamp, SQLITE_TIME_FORMAT)
        .map(|dt| dt.and_utc().timestamp())
        .map_err(|e| Error::ParseError(format!("Invalid timestamp '{timestamp}': {e}")))
}

/// Parse an upstream `upload_time` (`YYYYMMDDTHH:MM:SS`, UTC) into a stored timestamp
pub fn parse_upload_time(value: &str) -> Result<String> {
    NaiveDateTime::parse_from_str(value.trim(), UPSTREAM_TIME_FORMAT)
        .map(|dt| dt.and_utc().to_rfc3339())
        .map_err(|_| Error::UnparsableTimestamp(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_timestamp_round_trips() {
        let ts = current_timestamp();
        let parsed = parse_timestamp(&ts).unwrap();
        let now = Utc::now().timestamp();

        // Should be within a few seconds
        assert!((now - parsed).abs() < 5);
    }

    #[test]
    fn test_parse_sqlite_default_format() {
        assert_eq!(parse_timestamp("1970-01-02 00:00:00").unwrap(), 86_400);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_format_unix() {
        assert_eq!(format_unix(0), "1970-01-01T00:00:00+00:00");
        assert_eq!(parse_timestamp(&format_unix(1_300_000_000)).unwrap(), 1_300_000_000);
    }

    #[test]
    fn test_parse_upload_time() {
        assert_eq!(
            parse_upload_time("20110523T12:34:56").unwrap(),
            "2011-05-23T12:34:56+00:00"
        );
        assert!(matches!(
            parse_upload_time("2011-05-23 12:34:56"),
            Err(Error::UnparsableTimestamp(_))
        ));
        assert!(parse_upload_time("").is_err());
    }
}
