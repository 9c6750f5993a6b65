// src/repository/remote.rs

//! Remote index client
//!
//! [`RemoteIndex`] is the seam between the sync engine and an upstream index.
//! [`XmlRpcIndex`] implements it over the index's XML-RPC API; tests supply
//! in-memory fakes.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use tracing::debug;

use super::client::HttpClient;
use super::xmlrpc::{self, Value};

/// Raw metadata mapping of one release as returned upstream
pub type ReleaseData = BTreeMap<String, Value>;

/// One row of the upstream changelog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogEntry {
    pub name: String,
    pub version: Option<String>,
    /// Unix seconds
    pub timestamp: i64,
    pub action: String,
}

impl ChangelogEntry {
    /// Decode a `[name, version, timestamp, action]` row
    pub fn from_value(value: &Value) -> Result<Self> {
        let row = value
            .as_array()
            .ok_or_else(|| protocol("changelog row is not an array"))?;

        let name = row
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| protocol("changelog row has no package name"))?
            .to_string();
        let version = row
            .get(1)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let timestamp = row.get(2).and_then(Value::as_i64).unwrap_or_default();
        let action = row
            .get(3)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            name,
            version,
            timestamp,
            action,
        })
    }
}

/// One distribution file as described upstream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionDescriptor {
    pub filename: String,
    pub url: Option<String>,
    pub md5_digest: String,
    pub size: Option<i64>,
    /// Upstream `packagetype` (`sdist`, `bdist_egg`, ...)
    pub packagetype: String,
    pub python_version: String,
    pub comment_text: String,
    /// Raw `upload_time`, normally `YYYYMMDDTHH:MM:SS`
    pub upload_time: Option<String>,
}

impl DistributionDescriptor {
    /// Decode a `release_urls` struct
    pub fn from_value(value: &Value) -> Result<Self> {
        let members = value
            .as_struct()
            .ok_or_else(|| protocol("release_urls entry is not a struct"))?;

        let text = |key: &str| {
            members
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let filename = text("filename");
        if filename.is_empty() {
            return Err(protocol("release_urls entry has no filename"));
        }
        let packagetype = text("packagetype");
        if packagetype.is_empty() {
            return Err(protocol(format!("'{filename}' has no packagetype")));
        }

        Ok(Self {
            url: Some(text("url")).filter(|u| !u.is_empty()),
            md5_digest: text("md5_digest"),
            size: members.get("size").and_then(Value::as_i64),
            python_version: text("python_version"),
            comment_text: text("comment_text"),
            upload_time: Some(text("upload_time")).filter(|t| !t.is_empty()),
            filename,
            packagetype,
        })
    }
}

/// Read access to an upstream package index
pub trait RemoteIndex {
    /// Every package name the index knows
    fn list_packages(&self) -> Result<Vec<String>>;

    /// Changelog rows newer than `since` (Unix seconds)
    fn changelog_since(&self, since: i64) -> Result<Vec<ChangelogEntry>>;

    /// Versions of a package, optionally including hidden ones
    fn package_releases(&self, name: &str, include_hidden: bool) -> Result<Vec<String>>;

    /// Metadata mapping of one release
    fn release_data(&self, name: &str, version: &str) -> Result<ReleaseData>;

    /// Distribution files of one release
    fn release_urls(&self, name: &str, version: &str) -> Result<Vec<DistributionDescriptor>>;
}

/// Reject names that cannot be sent upstream
///
/// Names must be non-empty ASCII without whitespace or control characters.
pub fn validate_package_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii() && !c.is_ascii_whitespace() && !c.is_ascii_control());
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidPackageName(name.to_string()))
    }
}

fn protocol(msg: impl Into<String>) -> Error {
    Error::RemoteProtocolError(msg.into())
}

/// [`RemoteIndex`] over an XML-RPC endpoint
pub struct XmlRpcIndex {
    endpoint: String,
    http: HttpClient,
}

impl XmlRpcIndex {
    pub fn new(endpoint: impl Into<String>, http: HttpClient) -> Self {
        Self {
            endpoint: endpoint.into(),
            http,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn call(&self, method: &str, params: &[Value]) -> Result<Value> {
        debug!("XML-RPC {} on {}", method, self.endpoint);
        let body = xmlrpc::encode_call(method, params);
        let response = self.http.post_xml(&self.endpoint, body)?;
        xmlrpc::decode_response(&response)
    }

    fn call_array(&self, method: &str, params: &[Value]) -> Result<Vec<Value>> {
        match self.call(method, params)? {
            Value::Array(items) => Ok(items),
            other => Err(protocol(format!("{method} returned {other:?}, expected array"))),
        }
    }
}

fn strings(method: &str, items: Vec<Value>) -> Result<Vec<String>> {
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            other => Err(protocol(format!("{method} returned non-string {other:?}"))),
        })
        .collect()
}

impl RemoteIndex for XmlRpcIndex {
    fn list_packages(&self) -> Result<Vec<String>> {
        let items = self.call_array("list_packages", &[])?;
        strings("list_packages", items)
    }

    fn changelog_since(&self, since: i64) -> Result<Vec<ChangelogEntry>> {
        self.call_array("changelog", &[Value::Int(since)])?
            .iter()
            .map(ChangelogEntry::from_value)
            .collect()
    }

    fn package_releases(&self, name: &str, include_hidden: bool) -> Result<Vec<String>> {
        validate_package_name(name)?;
        let items = self.call_array(
            "package_releases",
            &[Value::from(name), Value::Bool(include_hidden)],
        )?;
        strings("package_releases", items)
    }

    fn release_data(&self, name: &str, version: &str) -> Result<ReleaseData> {
        validate_package_name(name)?;
        match self.call("release_data", &[Value::from(name), Value::from(version)])? {
            Value::Struct(members) => Ok(members),
            other => Err(protocol(format!(
                "release_data returned {other:?}, expected struct"
            ))),
        }
    }

    fn release_urls(&self, name: &str, version: &str) -> Result<Vec<DistributionDescriptor>> {
        validate_package_name(name)?;
        self.call_array("release_urls", &[Value::from(name), Value::from(version)])?
            .iter()
            .map(DistributionDescriptor::from_value)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_package_name() {
        assert!(validate_package_name("Django").is_ok());
        assert!(validate_package_name("zope.interface").is_ok());
        assert!(validate_package_name("django-filer_2").is_ok());

        assert!(matches!(
            validate_package_name(""),
            Err(Error::InvalidPackageName(_))
        ));
        assert!(validate_package_name("two words").is_err());
        assert!(validate_package_name("tab\there").is_err());
        assert!(validate_package_name("caf\u{e9}").is_err());
        assert!(validate_package_name("bell\u{7}").is_err());
    }

    #[test]
    fn test_invalid_name_never_reaches_the_wire() {
        // The endpoint is unroutable; a request attempt would surface as RemoteUnavailable
        let index = XmlRpcIndex::new("http://127.0.0.1:9/pypi", HttpClient::new().unwrap());
        assert!(matches!(
            index.package_releases("bad name", true),
            Err(Error::InvalidPackageName(_))
        ));
        assert!(matches!(
            index.release_data("caf\u{e9}", "1.0"),
            Err(Error::InvalidPackageName(_))
        ));
    }

    #[test]
    fn test_changelog_entry_from_value() {
        let row = Value::Array(vec![
            Value::from("pkgA"),
            Value::from("1.0"),
            Value::Int(1_306_150_000),
            Value::from("new release"),
        ]);
        let entry = ChangelogEntry::from_value(&row).unwrap();
        assert_eq!(entry.name, "pkgA");
        assert_eq!(entry.version.as_deref(), Some("1.0"));
        assert_eq!(entry.timestamp, 1_306_150_000);

        let row = Value::Array(vec![Value::from("pkgB"), Value::Nil, Value::Int(1)]);
        let entry = ChangelogEntry::from_value(&row).unwrap();
        assert!(entry.version.is_none());
        assert_eq!(entry.action, "");

        assert!(ChangelogEntry::from_value(&Value::from("oops")).is_err());
    }

    #[test]
    fn test_distribution_descriptor_from_value() {
        let mut members = BTreeMap::new();
        members.insert("filename".to_string(), Value::from("foo-1.0.tar.gz"));
        members.insert("packagetype".to_string(), Value::from("sdist"));
        members.insert("python_version".to_string(), Value::from("source"));
        members.insert("url".to_string(), Value::from("https://files.example/foo-1.0.tar.gz"));
        members.insert("md5_digest".to_string(), Value::from("0123456789abcdef0123456789abcdef"));
        members.insert("size".to_string(), Value::Int(2048));
        members.insert(
            "upload_time".to_string(),
            Value::DateTime("20110523T12:34:56".to_string()),
        );

        let desc = DistributionDescriptor::from_value(&Value::Struct(members.clone())).unwrap();
        assert_eq!(desc.filename, "foo-1.0.tar.gz");
        assert_eq!(desc.size, Some(2048));
        assert_eq!(desc.upload_time.as_deref(), Some("20110523T12:34:56"));
        assert_eq!(desc.comment_text, "");

        members.remove("packagetype");
        assert!(matches!(
            DistributionDescriptor::from_value(&Value::Struct(members)),
            Err(Error::RemoteProtocolError(_))
        ));
    }
}
