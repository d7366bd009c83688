//! OCI registry source.
//!
//! Releases are artefacts pushed to an OCI distribution registry (for
//! example with `oras push`). Tags are versions; each manifest layer is an
//! asset named by its `org.opencontainers.image.title` annotation and
//! fetched as a blob.
//!
//! Registries such as GHCR demand a bearer token even for anonymous pulls.
//! The first `401` response is answered by requesting a token from the realm
//! named in its `WWW-Authenticate` challenge; the token is then reused for
//! later API calls and handed to the blob downloader.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Deserialize;

use crate::artefact::download::{ArtefactDownloader, DEFAULT_TIMEOUT, HttpDownloader};
use crate::update_check::{VersionInfo, parse_version};

use super::asset::{AssetState, ReleaseAsset, ReleaseAssetSet};
use super::source::{ReleaseSource, SourceError, api_agent, decode_json, transport_error};

/// Annotation carrying a layer's original filename.
pub const TITLE_ANNOTATION: &str = "org.opencontainers.image.title";

/// Manifest media types accepted from the registry.
const MANIFEST_ACCEPT: &str =
    "application/vnd.oci.image.manifest.v1+json, application/vnd.docker.distribution.manifest.v2+json";

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageManifest {
    #[serde(default)]
    layers: Vec<ManifestLayer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestLayer {
    #[serde(default)]
    media_type: String,
    digest: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    annotations: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// The parameters of a `WWW-Authenticate: Bearer` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BearerChallenge {
    realm: String,
    service: Option<String>,
    scope: Option<String>,
}

/// Release source backed by an OCI distribution registry.
///
/// # Examples
///
/// ```
/// use updraft::release::oci::OciReleaseSource;
///
/// let source = OciReleaseSource::new("ghcr.io/octo-org/octo-tool:").unwrap();
/// assert_eq!(source.registry(), "ghcr.io");
/// assert_eq!(source.repository(), "octo-org/octo-tool");
/// ```
#[derive(Debug)]
pub struct OciReleaseSource {
    registry: String,
    repository: String,
    timeout: Duration,
    agent: ureq::Agent,
    token: Mutex<Option<String>>,
}

impl OciReleaseSource {
    /// Build a source for `reference`, written `registry/repository`.
    /// Trailing `:` characters are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidRepository`] when the registry or the
    /// repository is missing.
    pub fn new(reference: &str) -> Result<Self, SourceError> {
        let (registry, repository) = parse_reference(reference)?;
        Ok(Self {
            registry,
            repository,
            timeout: DEFAULT_TIMEOUT,
            agent: api_agent(DEFAULT_TIMEOUT),
            token: Mutex::new(None),
        })
    }

    /// Apply `timeout` to registry calls and blob downloads.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.agent = api_agent(timeout);
        self
    }

    /// The registry host.
    #[must_use]
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// The repository path within the registry.
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Every tag the repository publishes.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] if the registry cannot be queried.
    pub fn tags(&self) -> Result<Vec<String>, SourceError> {
        let url = format!("https://{}/v2/{}/tags/list", self.registry, self.repository);
        let list: TagList = self.get_json(&url, "application/json", None)?;
        Ok(list.tags.unwrap_or_default())
    }

    fn cached_token(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_token(&self, token: String) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    fn send(&self, url: &str, accept: &str) -> Result<ureq::http::Response<ureq::Body>, SourceError> {
        let mut request = self.agent.get(url).header("Accept", accept);
        if let Some(token) = self.cached_token() {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        request.call().map_err(|err| transport_error(url, &err))
    }

    /// GET `url` and decode JSON, authenticating once if challenged.
    /// `not_found_tag` turns a 404 into [`SourceError::ReleaseNotFound`].
    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        accept: &str,
        not_found_tag: Option<&str>,
    ) -> Result<T, SourceError> {
        let mut response = self.send(url, accept)?;

        if response.status().as_u16() == 401 {
            let challenge = response
                .headers()
                .get("www-authenticate")
                .and_then(|value| value.to_str().ok())
                .and_then(parse_bearer_challenge);
            if let Some(challenge) = challenge {
                let token = self.fetch_token(&challenge)?;
                self.store_token(token);
                response = self.send(url, accept)?;
            }
        }

        match (response.status().as_u16(), not_found_tag) {
            (200, _) => decode_json(url, response.into_body().into_reader()),
            (404, Some(tag)) => Err(SourceError::ReleaseNotFound {
                tag: tag.to_owned(),
            }),
            (status, _) => Err(SourceError::UnexpectedStatus {
                url: url.to_owned(),
                status,
            }),
        }
    }

    fn fetch_token(&self, challenge: &BearerChallenge) -> Result<String, SourceError> {
        log::debug!("requesting registry token from {}", challenge.realm);

        let mut request = self.agent.get(&challenge.realm);
        if let Some(service) = &challenge.service {
            request = request.query("service", service);
        }
        if let Some(scope) = &challenge.scope {
            request = request.query("scope", scope);
        }
        let response = request
            .call()
            .map_err(|err| transport_error(&challenge.realm, &err))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(SourceError::UnexpectedStatus {
                url: challenge.realm.clone(),
                status,
            });
        }

        let body: TokenResponse = decode_json(&challenge.realm, response.into_body().into_reader())?;
        body.token
            .or(body.access_token)
            .ok_or_else(|| SourceError::Decode {
                url: challenge.realm.clone(),
                reason: "token response carries no token".to_owned(),
            })
    }
}

impl ReleaseSource for OciReleaseSource {
    fn latest_version(&self) -> Result<VersionInfo, SourceError> {
        let tags = self.tags()?;
        let version = latest_semver_tag(&tags).ok_or_else(|| SourceError::NoVersions {
            repository: format!("{}/{}", self.registry, self.repository),
        })?;
        Ok(VersionInfo {
            version: version.to_owned(),
            released_at: None,
        })
    }

    fn list_assets(&self, tag: &str) -> Result<ReleaseAssetSet, SourceError> {
        let url = format!(
            "https://{}/v2/{}/manifests/{tag}",
            self.registry, self.repository
        );
        let manifest: ImageManifest = self.get_json(&url, MANIFEST_ACCEPT, Some(tag))?;
        let blob_base = format!("https://{}/v2/{}/blobs", self.registry, self.repository);
        Ok(layers_to_assets(manifest.layers, &blob_base))
    }

    fn downloader(&self) -> Box<dyn ArtefactDownloader> {
        let downloader = HttpDownloader::new(self.timeout);
        Box::new(match self.cached_token() {
            Some(token) => downloader.with_bearer_token(token),
            None => downloader,
        })
    }
}

/// Split `registry/repository`, ignoring trailing `:` characters.
fn parse_reference(reference: &str) -> Result<(String, String), SourceError> {
    let trimmed = reference.trim_end_matches(':');
    match trimmed.split_once('/') {
        Some((registry, repository)) if !registry.is_empty() && !repository.is_empty() => {
            Ok((registry.to_owned(), repository.to_owned()))
        }
        _ => Err(SourceError::InvalidRepository {
            reference: reference.to_owned(),
            reason: "expected registry/repository",
        }),
    }
}

/// The highest tag that parses as a semantic version; others are ignored.
fn latest_semver_tag(tags: &[String]) -> Option<&str> {
    tags.iter()
        .filter_map(|tag| parse_version(tag).ok().map(|version| (version, tag)))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, tag)| tag.as_str())
}

/// Turn titled manifest layers into uploaded assets; untitled layers are
/// skipped because nothing can select them by name.
fn layers_to_assets(layers: Vec<ManifestLayer>, blob_base: &str) -> ReleaseAssetSet {
    layers
        .into_iter()
        .filter_map(|layer| {
            let title = layer.annotations.get(TITLE_ANNOTATION)?.clone();
            let url = format!("{blob_base}/{}", layer.digest);
            Some(ReleaseAsset::new(
                title,
                layer.media_type,
                AssetState::Uploaded,
                layer.size,
                url,
            ))
        })
        .collect()
}

/// Parse `Bearer realm="...",service="...",scope="..."`.
fn parse_bearer_challenge(header: &str) -> Option<BearerChallenge> {
    let (scheme, params) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let mut fields: HashMap<String, String> = HashMap::new();
    let mut rest = params.trim();
    while !rest.is_empty() {
        let (key, after_key) = rest.split_once('=')?;
        let (value, remainder) = match after_key.strip_prefix('"') {
            Some(quoted) => {
                let (value, tail) = quoted.split_once('"')?;
                (value, tail)
            }
            None => after_key.split_once(',').map_or((after_key, ""), |(v, t)| (v, t)),
        };
        fields.insert(key.trim().to_ascii_lowercase(), value.to_owned());
        rest = remainder.trim_start_matches([',', ' ']);
    }

    Some(BearerChallenge {
        realm: fields.remove("realm")?,
        service: fields.remove("service"),
        scope: fields.remove("scope"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain("ghcr.io/octo-org/octo-tool", "ghcr.io", "octo-org/octo-tool")]
    #[case::trailing_colon("ghcr.io/octo-org/octo-tool:", "ghcr.io", "octo-org/octo-tool")]
    #[case::with_port("localhost:5000/tool", "localhost:5000", "tool")]
    fn parses_references(#[case] reference: &str, #[case] registry: &str, #[case] repo: &str) {
        let source = OciReleaseSource::new(reference).expect("valid reference");
        assert_eq!(source.registry(), registry);
        assert_eq!(source.repository(), repo);
    }

    #[rstest]
    #[case::no_repository("ghcr.io")]
    #[case::empty_registry("/tool")]
    #[case::only_colons(":::")]
    fn rejects_malformed_references(#[case] reference: &str) {
        assert!(matches!(
            parse_reference(reference),
            Err(SourceError::InvalidRepository { .. })
        ));
    }

    #[test]
    fn latest_tag_is_highest_semver() {
        let tags: Vec<String> = ["latest", "v1.2.0", "1.10.0", "v1.9.3", "main", "1.10.0-rc.1"]
            .into_iter()
            .map(str::to_owned)
            .collect();
        assert_eq!(latest_semver_tag(&tags), Some("1.10.0"));
    }

    #[test]
    fn no_semver_tags_yields_none() {
        let tags = vec!["latest".to_owned(), "edge".to_owned()];
        assert_eq!(latest_semver_tag(&tags), None);
    }

    #[test]
    fn titled_layers_become_uploaded_assets() {
        let manifest: ImageManifest = serde_json::from_str(
            r#"{
                "schemaVersion": 2,
                "layers": [
                    {
                        "mediaType": "application/vnd.oci.image.layer.v1.tar",
                        "digest": "sha256:aaaa",
                        "size": 42,
                        "annotations": {"org.opencontainers.image.title": "tool_linux_amd64.tar.gz"}
                    },
                    {
                        "mediaType": "application/vnd.oci.image.layer.v1.tar",
                        "digest": "sha256:bbbb",
                        "size": 7
                    }
                ]
            }"#,
        )
        .expect("manifest");

        let assets = layers_to_assets(manifest.layers, "https://ghcr.io/v2/o/r/blobs");
        assert_eq!(assets.len(), 1);
        let asset = assets.iter().next().expect("asset");
        assert_eq!(asset.name(), "tool_linux_amd64.tar.gz");
        assert_eq!(asset.download_url(), "https://ghcr.io/v2/o/r/blobs/sha256:aaaa");
        assert_eq!(asset.size_bytes(), 42);
        assert!(asset.is_uploaded());
    }

    #[test]
    fn parses_ghcr_challenge() {
        let challenge = parse_bearer_challenge(
            r#"Bearer realm="https://ghcr.io/token",service="ghcr.io",scope="repository:o/r:pull""#,
        )
        .expect("challenge");
        assert_eq!(
            challenge,
            BearerChallenge {
                realm: "https://ghcr.io/token".to_owned(),
                service: Some("ghcr.io".to_owned()),
                scope: Some("repository:o/r:pull".to_owned()),
            }
        );
    }

    #[test]
    fn challenge_without_realm_is_ignored() {
        assert_eq!(parse_bearer_challenge(r#"Bearer service="ghcr.io""#), None);
    }

    #[test]
    fn basic_challenge_is_ignored() {
        assert_eq!(parse_bearer_challenge(r#"Basic realm="registry""#), None);
    }

    #[test]
    fn token_response_accepts_either_field() {
        let docker: TokenResponse = serde_json::from_str(r#"{"token":"a"}"#).expect("json");
        let oauth: TokenResponse = serde_json::from_str(r#"{"access_token":"b"}"#).expect("json");
        assert_eq!(docker.token.or(docker.access_token).as_deref(), Some("a"));
        assert_eq!(oauth.token.or(oauth.access_token).as_deref(), Some("b"));
    }

    #[test]
    fn downloader_is_available_before_authentication() {
        let source = OciReleaseSource::new("ghcr.io/o/r").expect("valid reference");
        assert!(source.cached_token().is_none());
        let _downloader = source.downloader();
    }
}
