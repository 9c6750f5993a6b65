// src/repository/client.rs

//! HTTP client for upstream operations
//!
//! Thin wrapper around reqwest's blocking client used for XML-RPC calls,
//! simple-index pages and distribution downloads. It never retries: retry
//! policy belongs to the sync orchestrator, which knows which failures are
//! worth another attempt.

use crate::error::{Error, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;

use super::links::PageFetcher;
use super::mirror::FileFetcher;

/// Default timeout for HTTP requests (30 seconds)
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default User-Agent header
pub const USER_AGENT: &str = concat!("indexmirror/", env!("CARGO_PKG_VERSION"));

/// HTTP client wrapper
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a client with the default timeout and User-Agent
    pub fn new() -> Result<Self> {
        Self::with_settings(HTTP_TIMEOUT, USER_AGENT)
    }

    /// Create a client with an explicit timeout and User-Agent
    pub fn with_settings(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// POST an XML document and return the response body
    ///
    /// Transport failures and non-success statuses map to
    /// [`Error::RemoteUnavailable`]; an unreadable body is a protocol error.
    pub fn post_xml(&self, url: &str, body: String) -> Result<String> {
        debug!("POST {} ({} bytes)", url, body.len());

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .map_err(|e| Error::RemoteUnavailable(format!("Failed to reach {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::RemoteUnavailable(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        response
            .text()
            .map_err(|e| Error::RemoteProtocolError(format!("Failed to read response: {e}")))
    }

    /// GET a page as text
    pub fn get_text(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::RemoteUnavailable(format!("Failed to fetch {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::RemoteUnavailable(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        response
            .text()
            .map_err(|e| Error::RemoteUnavailable(format!("Failed to read {url}: {e}")))
    }

    /// Download a URL to bytes
    ///
    /// Every failure, including a 404, is a [`Error::DownloadFailure`].
    pub fn download_to_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Downloading {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::DownloadFailure(format!("Failed to fetch {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::DownloadFailure(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| Error::DownloadFailure(format!("Failed to read {url}: {e}")))?;

        Ok(bytes.to_vec())
    }
}

impl FileFetcher for HttpClient {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.download_to_bytes(url)
    }
}

impl PageFetcher for HttpClient {
    fn fetch_page(&self, url: &str) -> Result<String> {
        self.get_text(url)
    }
}
