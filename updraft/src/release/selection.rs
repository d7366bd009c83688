//! Platform-aware asset selection.
//!
//! Picks the single asset that best matches an OS/architecture pair. Tiers
//! are tried in order and the first uploaded asset satisfying a tier wins;
//! list order is never re-sorted.

use super::asset::{ReleaseAsset, ReleaseAssetSet};
use super::platform::Platform;
use thiserror::Error;

/// Token marking an architecture-independent build.
const ANY_ARCH_TOKEN: &str = "all";

/// Errors arising from asset selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// The release has no assets at all.
    #[error("no assets")]
    NoAssets,

    /// No uploaded asset matches the requested platform.
    #[error("no matching architectures for {os}/{arch}")]
    NoMatchingArchitectures {
        /// The requested OS token.
        os: String,
        /// The requested architecture token.
        arch: String,
    },
}

/// Select the best asset for `platform`.
///
/// 1. An uploaded asset whose lowercased name contains both the OS and the
///    architecture token.
/// 2. An uploaded asset whose lowercased name contains the OS token and
///    `all`.
///
/// # Errors
///
/// Returns [`SelectionError::NoAssets`] for an empty set and
/// [`SelectionError::NoMatchingArchitectures`] when neither tier matches.
///
/// # Examples
///
/// ```
/// use updraft::release::asset::{ReleaseAsset, ReleaseAssetSet};
/// use updraft::release::platform::Platform;
/// use updraft::release::selection::select_asset;
///
/// let assets = ReleaseAssetSet::new(vec![
///     ReleaseAsset::uploaded("foo_darwin_amd64.tar.gz", "https://example.test/1"),
///     ReleaseAsset::uploaded("foo_linux_amd64.tar.gz", "https://example.test/2"),
/// ]);
/// let chosen = select_asset(&assets, &Platform::new("linux", "amd64")).unwrap();
/// assert_eq!(chosen.name(), "foo_linux_amd64.tar.gz");
/// ```
pub fn select_asset<'a>(
    assets: &'a ReleaseAssetSet,
    platform: &Platform,
) -> Result<&'a ReleaseAsset, SelectionError> {
    if assets.is_empty() {
        return Err(SelectionError::NoAssets);
    }

    let os = platform.os();
    let arch = platform.arch();

    find_uploaded(assets, |name| name.contains(os) && name.contains(arch))
        .or_else(|| find_uploaded(assets, |name| name.contains(os) && name.contains(ANY_ARCH_TOKEN)))
        .ok_or_else(|| SelectionError::NoMatchingArchitectures {
            os: os.to_owned(),
            arch: arch.to_owned(),
        })
}

/// Return the first uploaded asset whose lowercased name satisfies `matches`.
fn find_uploaded(
    assets: &ReleaseAssetSet,
    matches: impl Fn(&str) -> bool,
) -> Option<&ReleaseAsset> {
    assets
        .uploaded()
        .find(|asset| matches(&asset.name().to_lowercase()))
}
