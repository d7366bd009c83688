//! Companion checksum asset lookup.
//!
//! Releases publish checksums either per asset (`foo.tar.gz.sha256`) or as
//! one aggregate manifest (`checksums.txt`, `foo_1.2.3_checksums.txt`).
//! Absence of both is a normal outcome and yields `None`.

use crate::release::asset::{ReleaseAsset, ReleaseAssetSet};

/// Suffix of a per-asset checksum file.
const PER_ASSET_SUFFIX: &str = ".sha256";

/// Substring identifying an aggregate checksum manifest.
const AGGREGATE_MARKER: &str = "checksums";

/// Suffix of an aggregate checksum manifest.
const AGGREGATE_SUFFIX: &str = ".txt";

/// Find the checksum asset covering `chosen_asset_name`, if any.
///
/// A per-asset `.sha256` file is preferred over an aggregate manifest. Only
/// uploaded assets are considered.
///
/// # Examples
///
/// ```
/// use updraft::artefact::checksum::resolve_checksum_asset;
/// use updraft::release::asset::{ReleaseAsset, ReleaseAssetSet};
///
/// let assets = ReleaseAssetSet::new(vec![
///     ReleaseAsset::uploaded("foo_linux_amd64.tar.gz", "https://example.test/1"),
///     ReleaseAsset::uploaded("checksums.txt", "https://example.test/2"),
/// ]);
/// let found = resolve_checksum_asset(&assets, "foo_linux_amd64.tar.gz");
/// assert_eq!(found.map(ReleaseAsset::name), Some("checksums.txt"));
/// ```
#[must_use]
pub fn resolve_checksum_asset<'a>(
    assets: &'a ReleaseAssetSet,
    chosen_asset_name: &str,
) -> Option<&'a ReleaseAsset> {
    assets
        .uploaded()
        .find(|asset| is_per_asset_checksum(asset.name(), chosen_asset_name))
        .or_else(|| {
            assets
                .uploaded()
                .find(|asset| is_aggregate_manifest(asset.name()))
        })
}

fn is_per_asset_checksum(name: &str, chosen_asset_name: &str) -> bool {
    name.starts_with(chosen_asset_name) && name.ends_with(PER_ASSET_SUFFIX)
}

fn is_aggregate_manifest(name: &str) -> bool {
    name.contains(AGGREGATE_MARKER) && name.ends_with(AGGREGATE_SUFFIX)
}
