//! The capability contract shared by every release source.
//!
//! A source answers two questions: which version is the newest, and which
//! assets does a given version publish. It also hands out the downloader
//! that can fetch those assets, since some registries gate blob downloads
//! behind the same credentials used for listing.

use std::time::Duration;

use crate::artefact::download::ArtefactDownloader;
use crate::update_check::VersionInfo;

use super::asset::ReleaseAssetSet;

/// Errors arising from querying a release source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The repository reference could not be parsed.
    #[error("invalid repository reference \"{reference}\": {reason}")]
    InvalidRepository {
        /// The rejected reference.
        reference: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// The requested release does not exist.
    #[error("release not found: {tag}")]
    ReleaseNotFound {
        /// The tag that was requested, or `latest`.
        tag: String,
    },

    /// The request could not be completed.
    #[error("request to {url} failed: {reason}")]
    Http {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The server answered with a status other than success or not-found.
    #[error("unexpected status code {status} from {url}")]
    UnexpectedStatus {
        /// The URL that was requested.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response body could not be decoded.
    #[error("decode response from {url}: {reason}")]
    Decode {
        /// The URL that was requested.
        url: String,
        /// The decoding failure.
        reason: String,
    },

    /// The source publishes no version this crate can compare.
    #[error("no semantic version tags found for {repository}")]
    NoVersions {
        /// The repository that was queried.
        repository: String,
    },
}

/// A place releases are published.
#[cfg_attr(test, mockall::automock)]
pub trait ReleaseSource {
    /// The newest published version.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] if the source cannot be queried or has no
    /// usable versions.
    fn latest_version(&self) -> Result<VersionInfo, SourceError>;

    /// The assets published for `tag`.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] if the release does not exist or the source
    /// cannot be queried.
    fn list_assets(&self, tag: &str) -> Result<ReleaseAssetSet, SourceError>;

    /// A downloader able to fetch the URLs returned by
    /// [`list_assets`](Self::list_assets).
    fn downloader(&self) -> Box<dyn ArtefactDownloader>;
}

/// Build an agent for API calls that reports every status as a response, so
/// sources can map 401 and 404 themselves.
pub(crate) fn api_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build();
    ureq::Agent::new_with_config(config)
}

/// Map a transport failure to a [`SourceError`].
pub(crate) fn transport_error(url: &str, err: &ureq::Error) -> SourceError {
    SourceError::Http {
        url: url.to_owned(),
        reason: err.to_string(),
    }
}

/// Decode a JSON response body.
pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(
    url: &str,
    body: impl std::io::Read,
) -> Result<T, SourceError> {
    serde_json::from_reader(body).map_err(|err| {
        SourceError::Decode {
            url: url.to_owned(),
            reason: err.to_string(),
        }
    })
}
