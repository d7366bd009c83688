//! GitHub Releases source.
//!
//! Queries the REST API for a repository's latest or tagged release. Asset
//! download URLs are the public `browser_download_url` values, fetched with
//! a plain [`HttpDownloader`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::artefact::download::{ArtefactDownloader, DEFAULT_TIMEOUT, HttpDownloader};
use crate::update_check::VersionInfo;

use super::asset::ReleaseAssetSet;
use super::source::{ReleaseSource, SourceError, api_agent, decode_json, transport_error};

/// Public GitHub REST endpoint.
pub const GITHUB_API: &str = "https://api.github.com";

/// Media type requested from the REST API.
const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Pseudo-tag selecting the newest release.
const LATEST: &str = "latest";

/// A release as returned by the GitHub REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRelease {
    /// The release tag.
    pub tag_name: String,
    /// When the release was published; drafts have none.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Files attached to the release.
    #[serde(default)]
    pub assets: ReleaseAssetSet,
}

/// Release source backed by GitHub Releases.
///
/// # Examples
///
/// ```
/// use updraft::release::github::GitHubReleaseSource;
///
/// let source = GitHubReleaseSource::new("octo-org/octo-tool").unwrap();
/// assert_eq!(source.owner(), "octo-org");
/// assert_eq!(source.repo(), "octo-tool");
/// ```
#[derive(Debug, Clone)]
pub struct GitHubReleaseSource {
    owner: String,
    repo: String,
    api_base: String,
    token: Option<String>,
    timeout: Duration,
    agent: ureq::Agent,
}

impl GitHubReleaseSource {
    /// Build a source for `reference`, either `owner/repo` or
    /// `host/owner/repo`.
    ///
    /// A host other than `github.com` is treated as a GitHub Enterprise
    /// server whose REST API lives under `https://{host}/api/v3`.
    ///
    /// A non-empty `GITHUB_TOKEN` environment variable is sent as a bearer
    /// token to lift API rate limits.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidRepository`] for any other shape.
    pub fn new(reference: &str) -> Result<Self, SourceError> {
        let (host, owner, repo) = parse_repository(reference)?;
        Ok(Self {
            owner,
            repo,
            api_base: api_base_for_host(host.as_deref()),
            token: std::env::var("GITHUB_TOKEN")
                .ok()
                .filter(|token| !token.is_empty()),
            timeout: DEFAULT_TIMEOUT,
            agent: api_agent(DEFAULT_TIMEOUT),
        })
    }

    /// Use a different REST endpoint, such as a GitHub Enterprise server.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_owned();
        self
    }

    /// Apply `timeout` to API calls and downloads.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.agent = api_agent(timeout);
        self
    }

    /// The repository owner.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The repository name.
    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Fetch the release named `tag`, or the newest release for `latest`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::ReleaseNotFound`] on 404 and
    /// [`SourceError::UnexpectedStatus`] on any other non-200 status.
    pub fn release(&self, tag: &str) -> Result<GitHubRelease, SourceError> {
        let url = release_url(&self.api_base, &self.owner, &self.repo, tag);
        log::debug!("fetching release details from {url}");

        let mut request = self.agent.get(&url).header("Accept", GITHUB_ACCEPT);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        let response = request.call().map_err(|err| transport_error(&url, &err))?;

        check_status(&url, tag, response.status().as_u16())?;
        decode_json(&url, response.into_body().into_reader())
    }
}

impl ReleaseSource for GitHubReleaseSource {
    fn latest_version(&self) -> Result<VersionInfo, SourceError> {
        let release = self.release(LATEST)?;
        Ok(VersionInfo {
            version: release.tag_name,
            released_at: release.published_at,
        })
    }

    fn list_assets(&self, tag: &str) -> Result<ReleaseAssetSet, SourceError> {
        Ok(self.release(tag)?.assets)
    }

    fn downloader(&self) -> Box<dyn ArtefactDownloader> {
        Box::new(HttpDownloader::new(self.timeout))
    }
}

/// Split `owner/repo` or `host/owner/repo` into its parts.
fn parse_repository(reference: &str) -> Result<(Option<String>, String, String), SourceError> {
    let invalid = |reason| SourceError::InvalidRepository {
        reference: reference.to_owned(),
        reason,
    };

    let parts: Vec<&str> = reference.split('/').collect();
    let (host, owner, repo) = match parts.as_slice() {
        [owner, repo] => (None, *owner, *repo),
        [host, owner, repo] => {
            if host.is_empty() {
                return Err(invalid("host must not be empty"));
            }
            (Some((*host).to_owned()), *owner, *repo)
        }
        _ => return Err(invalid("expected owner/repo or host/owner/repo")),
    };
    if owner.is_empty() || repo.is_empty() {
        return Err(invalid("owner and repository must not be empty"));
    }
    Ok((host, owner.to_owned(), repo.to_owned()))
}

fn api_base_for_host(host: Option<&str>) -> String {
    match host {
        None => GITHUB_API.to_owned(),
        Some(host) if host.eq_ignore_ascii_case("github.com") => GITHUB_API.to_owned(),
        Some(host) => format!("https://{host}/api/v3"),
    }
}

/// REST URL for `tag`, with `latest` selecting the newest release.
fn release_url(api_base: &str, owner: &str, repo: &str, tag: &str) -> String {
    if tag == LATEST {
        format!("{api_base}/repos/{owner}/{repo}/releases/latest")
    } else {
        format!("{api_base}/repos/{owner}/{repo}/releases/tags/{tag}")
    }
}

fn check_status(url: &str, tag: &str, status: u16) -> Result<(), SourceError> {
    match status {
        200 => Ok(()),
        404 => Err(SourceError::ReleaseNotFound {
            tag: tag.to_owned(),
        }),
        _ => Err(SourceError::UnexpectedStatus {
            url: url.to_owned(),
            status,
        }),
    }
}
