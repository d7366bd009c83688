//! Release asset model shared by every release source.
//!
//! Assets are immutable values produced by a [`ReleaseSource`] and consumed
//! by the selection and checksum stages. Only assets whose upload finished
//! are eligible; [`ReleaseAssetSet::uploaded`] is the one place that filter
//! lives.
//!
//! [`ReleaseSource`]: super::source::ReleaseSource

use serde::Deserialize;
use std::fmt;

/// Upload state of a release asset.
///
/// GitHub reports `uploaded` once an asset is complete and `open` (or
/// `starter`) while an upload is in flight. Anything unrecognised maps to
/// [`AssetState::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum AssetState {
    /// The asset is fully uploaded and downloadable.
    Uploaded,
    /// The asset upload has not completed.
    Pending,
    /// Any state this crate does not understand.
    Other,
}

impl From<String> for AssetState {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<&str> for AssetState {
    fn from(value: &str) -> Self {
        match value {
            "uploaded" => Self::Uploaded,
            "open" | "starter" | "pending" => Self::Pending,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for AssetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uploaded => write!(f, "uploaded"),
            Self::Pending => write!(f, "pending"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A single downloadable file attached to a release.
///
/// Field names follow the GitHub REST payload so that the GitHub source can
/// deserialize assets directly.
///
/// # Examples
///
/// ```
/// use updraft::release::asset::{AssetState, ReleaseAsset};
///
/// let asset = ReleaseAsset::uploaded("foo_linux_amd64.tar.gz", "https://example.test/a");
/// assert_eq!(asset.state(), AssetState::Uploaded);
/// assert!(asset.is_uploaded());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    name: String,
    #[serde(default)]
    content_type: String,
    state: AssetState,
    #[serde(default, rename = "size")]
    size_bytes: u64,
    #[serde(rename = "browser_download_url")]
    download_url: String,
}

impl ReleaseAsset {
    /// Construct an asset from all of its fields.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        state: AssetState,
        size_bytes: u64,
        download_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            state,
            size_bytes,
            download_url: download_url.into(),
        }
    }

    /// Construct an uploaded asset with no content type or size.
    #[must_use]
    pub fn uploaded(name: impl Into<String>, download_url: impl Into<String>) -> Self {
        Self::new(name, "", AssetState::Uploaded, 0, download_url)
    }

    /// The asset filename as published.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The MIME type reported by the release host.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// The upload state reported by the release host.
    #[must_use]
    pub fn state(&self) -> AssetState {
        self.state
    }

    /// Size of the asset in bytes, zero when unknown.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// The URL from which the asset can be fetched.
    #[must_use]
    pub fn download_url(&self) -> &str {
        &self.download_url
    }

    /// Whether the asset is eligible for selection.
    #[must_use]
    pub fn is_uploaded(&self) -> bool {
        self.state == AssetState::Uploaded
    }
}

/// The ordered assets of one release tag.
///
/// Order is preserved exactly as the source reported it; selection relies on
/// it for tie-breaking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ReleaseAssetSet(Vec<ReleaseAsset>);

impl ReleaseAssetSet {
    /// Wrap a list of assets.
    #[must_use]
    pub fn new(assets: Vec<ReleaseAsset>) -> Self {
        Self(assets)
    }

    /// Whether the set contains no assets at all, uploaded or not.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of assets, uploaded or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over every asset in list order.
    pub fn iter(&self) -> impl Iterator<Item = &ReleaseAsset> {
        self.0.iter()
    }

    /// Iterate over the assets eligible for selection, in list order.
    pub fn uploaded(&self) -> impl Iterator<Item = &ReleaseAsset> {
        self.0.iter().filter(|asset| asset.is_uploaded())
    }
}

impl From<Vec<ReleaseAsset>> for ReleaseAssetSet {
    fn from(assets: Vec<ReleaseAsset>) -> Self {
        Self(assets)
    }
}

impl FromIterator<ReleaseAsset> for ReleaseAssetSet {
    fn from_iter<I: IntoIterator<Item = ReleaseAsset>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ReleaseAssetSet {
    type Item = &'a ReleaseAsset;
    type IntoIter = std::slice::Iter<'a, ReleaseAsset>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
