//! Release asset download over HTTP.
//!
//! Provides a trait-based abstraction for fetching asset bodies so that the
//! pipeline can be exercised in tests without network access. The production
//! implementation is a thin wrapper around a `ureq` agent.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

/// Default network timeout for a single request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for fetching release assets by URL.
///
/// # Examples
///
/// ```
/// use updraft::artefact::download::HttpDownloader;
///
/// let downloader = HttpDownloader::default();
/// // Use downloader.download_to(url, path) in production
/// # let _ = downloader;
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArtefactDownloader {
    /// Open a streaming reader over the body at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the asset is not found.
    fn open(&self, url: &str) -> Result<Box<dyn Read>, DownloadError>;

    /// Download the body at `url` into the file at `dest`, returning the
    /// number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if the request or the file write fails.
    fn download_to(&self, url: &str, dest: &Path) -> Result<u64, DownloadError>;
}

/// Errors arising from asset download operations.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP request failed.
    #[error("download failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested asset was not found (HTTP 404).
    #[error("asset not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP-based downloader using `ureq`.
///
/// An optional bearer token is attached to every request, which registries
/// such as GHCR require even for anonymous pulls.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    agent: ureq::Agent,
    bearer_token: Option<String>,
}

impl HttpDownloader {
    /// Build a downloader whose requests time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: http_agent(timeout),
            bearer_token: None,
        }
    }

    /// Attach `token` as an `Authorization: Bearer` header on every request.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn get(&self, url: &str) -> Result<ureq::http::Response<ureq::Body>, DownloadError> {
        let mut request = self.agent.get(url);
        if let Some(token) = &self.bearer_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        request.call().map_err(|e| map_ureq_error(url, &e))
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl ArtefactDownloader for HttpDownloader {
    fn open(&self, url: &str) -> Result<Box<dyn Read>, DownloadError> {
        let response = self.get(url)?;
        Ok(Box::new(response.into_body().into_reader()))
    }

    fn download_to(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let response = self.get(url)?;
        let mut file = File::create(dest)?;
        let written = std::io::copy(&mut response.into_body().into_reader(), &mut file)?;
        file.sync_all()?;
        log::debug!("downloaded {written} bytes from {url}");
        Ok(written)
    }
}

/// Build a `ureq` agent with a global request timeout.
#[must_use]
pub fn http_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build();
    ureq::Agent::new_with_config(config)
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        other => DownloadError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
