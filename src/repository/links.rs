// src/repository/links.rs

//! External link scanner
//!
//! Some projects host files outside the index and only link to them from
//! their simple-index page. The scanner reads that page, follows absolute
//! links that are not themselves files one level deep, and records every
//! file whose name parses to this project as an externally sourced
//! distribution.

use crate::db::models::{Package, PackageIndex, Provenance, Release};
use crate::error::{Error, Result};
use crate::hash::is_md5_hex;
use crate::timestamp::current_timestamp;
use regex::Regex;
use rusqlite::Connection;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use url::Url;

use super::filename::parse_filename;
use super::reconcile::{ExternalFile, MetadataReconciler, ReconcileAction};
use super::remote::validate_package_name;

/// Fetches HTML pages
pub trait PageFetcher {
    fn fetch_page(&self, url: &str) -> Result<String>;
}

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).unwrap()
});

/// Raw `href` values of every anchor in a page
pub fn extract_hrefs(html: &str) -> Vec<String> {
    HREF_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| m.as_str().trim().replace("&amp;", "&"))
        .filter(|href| !href.is_empty())
        .collect()
}

/// Interpret a link as a distribution file, if its name parses
pub fn external_file(url: &Url) -> Option<ExternalFile> {
    let filename = url.path_segments()?.next_back()?.to_string();
    let parsed = parse_filename(&filename)?;

    let md5_digest = url
        .fragment()
        .and_then(|f| f.strip_prefix("md5="))
        .filter(|digest| is_md5_hex(digest))
        .map(str::to_lowercase)
        .unwrap_or_default();

    let mut bare = url.clone();
    bare.set_fragment(None);

    Some(ExternalFile {
        filename,
        url: bare.to_string(),
        md5_digest,
        parsed,
    })
}

/// Result of scanning one package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub package: String,
    /// Pages fetched, including the index page
    pub pages: usize,
    /// Distinct files accepted for this project
    pub discovered: usize,
    pub created: usize,
    pub updated: usize,
    /// Files for other projects, duplicates, and unusable versions
    pub ignored: usize,
}

/// Scans simple-index pages for externally hosted files
pub struct ExternalLinkScanner<'a> {
    conn: &'a Connection,
    fetcher: &'a dyn PageFetcher,
}

impl<'a> ExternalLinkScanner<'a> {
    pub fn new(conn: &'a Connection, fetcher: &'a dyn PageFetcher) -> Self {
        Self { conn, fetcher }
    }

    /// Scan one package's simple-index page
    ///
    /// A failure to fetch the index page fails the package; a failure on a
    /// followed page only skips that page.
    pub fn scan_package(&self, index: &PackageIndex, package: &mut Package) -> Result<ScanReport> {
        validate_package_name(&package.name)?;

        let page_url = index.simple_page_url(&package.name);
        let mut report = ScanReport {
            package: package.name.clone(),
            ..ScanReport::default()
        };

        let html = self.fetcher.fetch_page(&page_url)?;
        report.pages += 1;

        let mut candidates = Vec::new();
        let mut follow = Vec::new();
        for href in extract_hrefs(&html) {
            // Relative links on the index page point at files the index hosts itself
            let Ok(url) = Url::parse(&href) else {
                continue;
            };
            if let Some(file) = external_file(&url) {
                candidates.push(file);
            } else if matches!(url.scheme(), "http" | "https") && !follow.contains(&url) {
                follow.push(url);
            }
        }

        for page in follow {
            let body = match self.fetcher.fetch_page(page.as_str()) {
                Ok(body) => body,
                Err(e) => {
                    warn!("Skipping {} for {}: {}", page, package.name, e);
                    continue;
                }
            };
            report.pages += 1;

            candidates.extend(
                extract_hrefs(&body)
                    .iter()
                    .filter_map(|href| page.join(href).ok())
                    .filter_map(|url| external_file(&url)),
            );
        }

        let mut seen = HashSet::new();
        let reconciler = MetadataReconciler::new(self.conn);
        let package_id = package.require_id()?;

        for file in candidates {
            if file.parsed.project != package.name {
                debug!("{} does not belong to {}", file.filename, package.name);
                report.ignored += 1;
                continue;
            }

            let identity = (
                file.parsed.version.clone(),
                file.parsed.filetype,
                file.parsed.pyversion.clone(),
            );
            if !seen.insert(identity) {
                report.ignored += 1;
                continue;
            }

            let release = match self.release_for(package_id, &file.parsed.version) {
                Ok(release) => release,
                Err(Error::InvalidVersion(version)) => {
                    warn!("Skipping {}: invalid version '{}'", file.filename, version);
                    report.ignored += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            report.discovered += 1;
            match reconciler.reconcile_external(&release, &file)? {
                ReconcileAction::Created => report.created += 1,
                ReconcileAction::Updated => report.updated += 1,
                ReconcileAction::Unchanged | ReconcileAction::KeptLocal => {}
            }
        }

        package.parsed_external_links_at = Some(current_timestamp());
        package.update(self.conn)?;

        info!(
            "{}: {} external files ({} new, {} updated) across {} pages",
            package.name, report.discovered, report.created, report.updated, report.pages
        );
        Ok(report)
    }

    fn release_for(&self, package_id: i64, version: &str) -> Result<Release> {
        Release::validate_version(version)?;
        if let Some(release) = Release::find(self.conn, package_id, version)? {
            return Ok(release);
        }

        let mut release = Release::new(package_id, version.to_string());
        release.provenance = Provenance::External;
        release.insert(self.conn)?;
        Ok(release)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_hrefs() {
        let html = r#"<html><body>
<a href="../../packages/source/f/foo/foo-1.0.tar.gz#md5=0123456789abcdef0123456789abcdef">foo-1.0.tar.gz</a><br/>
<A HREF='http://foo.example/download/'>download</A>
<a rel="homepage" href=http://foo.example/>home</a>
<a name="anchor">no link</a>
<a href="https://x.example/?a=1&amp;b=2">query</a>
</body></html>"#;

        let hrefs = extract_hrefs(html);
        assert_eq!(
            hrefs,
            vec![
                "../../packages/source/f/foo/foo-1.0.tar.gz#md5=0123456789abcdef0123456789abcdef",
                "http://foo.example/download/",
                "http://foo.example/",
                "https://x.example/?a=1&b=2",
            ]
        );
    }

    #[test]
    fn test_external_file_from_link() {
        let url =
            Url::parse("http://foo.example/dl/foo-1.0.tar.gz#md5=0123456789ABCDEF0123456789ABCDEF")
                .unwrap();
        let file = external_file(&url).unwrap();
        assert_eq!(file.filename, "foo-1.0.tar.gz");
        assert_eq!(file.url, "http://foo.example/dl/foo-1.0.tar.gz");
        assert_eq!(file.md5_digest, "0123456789abcdef0123456789abcdef");
        assert_eq!(file.parsed.filetype, "sdist");
        assert_eq!(file.parsed.pyversion, "source");

        let url = Url::parse("http://foo.example/dl/foo-1.0.tar.gz#egg=foo").unwrap();
        assert_eq!(external_file(&url).unwrap().md5_digest, "");

        assert!(external_file(&Url::parse("http://foo.example/").unwrap()).is_none());
        assert!(external_file(&Url::parse("http://foo.example/about.html").unwrap()).is_none());
    }
}
