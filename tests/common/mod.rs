// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use indexmirror::db;
use indexmirror::db::models::PackageIndex;
use indexmirror::repository::xmlrpc::Value;
use indexmirror::repository::{
    ArtifactStore, ChangelogEntry, DistributionDescriptor, FileFetcher, PageFetcher, ReleaseData,
    RemoteIndex, add_index,
};
use indexmirror::{Error, Result};
use rusqlite::Connection;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;
use tempfile::TempDir;

/// A fresh database with one registered index.
///
/// Returns (TempDir, Connection, index) - keep the TempDir alive to prevent cleanup.
pub fn setup_mirror_db() -> (TempDir, Connection, PackageIndex) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir
        .path()
        .join("mirror.db")
        .to_str()
        .unwrap()
        .to_string();

    db::init(&db_path).unwrap();
    let conn = db::open(&db_path).unwrap();
    let index = add_index(
        &conn,
        "pypi".to_string(),
        "https://pypi.example/pypi".to_string(),
        "https://pypi.example/simple".to_string(),
    )
    .unwrap();

    (temp_dir, conn, index)
}

/// One release served by [`FakeRemote`]
#[derive(Debug, Clone)]
pub struct FakeRelease {
    pub version: String,
    pub data: ReleaseData,
    pub urls: Vec<DistributionDescriptor>,
}

impl FakeRelease {
    pub fn new(version: &str, summary: &str) -> Self {
        let mut data = BTreeMap::new();
        data.insert("version".to_string(), Value::from(version));
        data.insert("summary".to_string(), Value::from(summary));
        Self {
            version: version.to_string(),
            data,
            urls: Vec::new(),
        }
    }

    pub fn with_classifiers(mut self, classifiers: &[&str]) -> Self {
        let values = classifiers.iter().map(|c| Value::from(*c)).collect();
        self.data
            .insert("classifiers".to_string(), Value::Array(values));
        self
    }

    /// Add a file whose URL serves `content` from a [`CountingFetcher`]
    pub fn with_file(
        mut self,
        filename: &str,
        packagetype: &str,
        pyversion: &str,
        content: &[u8],
    ) -> Self {
        self.urls.push(DistributionDescriptor {
            filename: filename.to_string(),
            url: Some(file_url(filename)),
            md5_digest: indexmirror::hash::md5_hex(content),
            size: Some(content.len() as i64),
            packagetype: packagetype.to_string(),
            python_version: pyversion.to_string(),
            comment_text: String::new(),
            upload_time: Some("20110523T12:00:00".to_string()),
        });
        self
    }
}

pub fn file_url(filename: &str) -> String {
    format!("https://files.example/packages/{filename}")
}

/// In-memory upstream index with call counters and injectable failures
#[derive(Default)]
pub struct FakeRemote {
    pub packages: BTreeMap<String, Vec<FakeRelease>>,
    pub changelog: Vec<ChangelogEntry>,
    /// Packages whose release data is malformed
    pub broken: HashSet<String>,
    /// Remaining `RemoteUnavailable` answers before calls succeed
    pub outages: Cell<u32>,
    pub calls: RefCell<HashMap<&'static str, usize>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, name: &str, releases: Vec<FakeRelease>) -> Self {
        self.packages.insert(name.to_string(), releases);
        self
    }

    pub fn with_changelog(mut self, rows: &[(&str, Option<&str>, i64, &str)]) -> Self {
        self.changelog = rows
            .iter()
            .map(|(name, version, timestamp, action)| ChangelogEntry {
                name: name.to_string(),
                version: version.map(str::to_string),
                timestamp: *timestamp,
                action: action.to_string(),
            })
            .collect();
        self
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.borrow().get(method).copied().unwrap_or(0)
    }

    fn record(&self, method: &'static str) -> Result<()> {
        *self.calls.borrow_mut().entry(method).or_default() += 1;
        let remaining = self.outages.get();
        if remaining > 0 {
            self.outages.set(remaining - 1);
            return Err(Error::RemoteUnavailable("connection reset".to_string()));
        }
        Ok(())
    }

    fn release(&self, name: &str, version: &str) -> Result<&FakeRelease> {
        self.packages
            .get(name)
            .and_then(|releases| releases.iter().find(|r| r.version == version))
            .ok_or_else(|| Error::RemoteProtocolError(format!("unknown release {name} {version}")))
    }
}

impl RemoteIndex for FakeRemote {
    fn list_packages(&self) -> Result<Vec<String>> {
        self.record("list_packages")?;
        Ok(self.packages.keys().cloned().collect())
    }

    fn changelog_since(&self, since: i64) -> Result<Vec<ChangelogEntry>> {
        self.record("changelog")?;
        Ok(self
            .changelog
            .iter()
            .filter(|entry| entry.timestamp > since)
            .cloned()
            .collect())
    }

    fn package_releases(&self, name: &str, _include_hidden: bool) -> Result<Vec<String>> {
        self.record("package_releases")?;
        Ok(self
            .packages
            .get(name)
            .map(|releases| releases.iter().map(|r| r.version.clone()).collect())
            .unwrap_or_default())
    }

    fn release_data(&self, name: &str, version: &str) -> Result<ReleaseData> {
        self.record("release_data")?;
        if self.broken.contains(name) {
            return Err(Error::RemoteProtocolError(format!("malformed response for {name}")));
        }
        Ok(self.release(name, version)?.data.clone())
    }

    fn release_urls(&self, name: &str, version: &str) -> Result<Vec<DistributionDescriptor>> {
        self.record("release_urls")?;
        Ok(self.release(name, version)?.urls.clone())
    }
}

/// File fetcher serving fixed content and counting requests
#[derive(Clone, Default)]
pub struct CountingFetcher {
    pub files: Rc<HashMap<String, Vec<u8>>>,
    pub requests: Rc<Cell<usize>>,
}

impl CountingFetcher {
    pub fn new(files: &[(&str, &[u8])]) -> Self {
        Self {
            files: Rc::new(
                files
                    .iter()
                    .map(|(name, content)| (file_url(name), content.to_vec()))
                    .collect(),
            ),
            requests: Rc::new(Cell::new(0)),
        }
    }
}

impl FileFetcher for CountingFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.set(self.requests.get() + 1);
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| Error::DownloadFailure(format!("{url}: HTTP 404")))
    }
}

/// Artifact store under `temp_dir`, returning the request counter
pub fn artifact_store(
    temp_dir: &TempDir,
    fetcher: CountingFetcher,
) -> (ArtifactStore, Rc<Cell<usize>>) {
    let requests = fetcher.requests.clone();
    let store = ArtifactStore::new(temp_dir.path().join("files"), Box::new(fetcher));
    (store, requests)
}

/// Page fetcher serving canned HTML by URL
#[derive(Default)]
pub struct FakePages {
    pub pages: HashMap<String, String>,
}

impl FakePages {
    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }
}

impl PageFetcher for FakePages {
    fn fetch_page(&self, url: &str) -> Result<String> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| Error::RemoteUnavailable(format!("{url}: HTTP 404")))
    }
}
