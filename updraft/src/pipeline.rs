//! Download and verification orchestrator.
//!
//! Composes the release and artefact stages: select the platform asset,
//! download it to a scoped temporary file, locate and check its published
//! checksum, and extract the executable. Every intermediate temporary file
//! is removed on every exit path; only the extracted executable outlives the
//! call, and the caller owns it.

use std::path::{Path, PathBuf};

use crate::artefact::checksum::resolve_checksum_asset;
use crate::artefact::checksum_manifest::{ChecksumError, fetch_digest_for_file};
use crate::artefact::download::{ArtefactDownloader, DownloadError, HttpDownloader};
use crate::artefact::extraction::{ExecutableExtractor, ExtractionError, GzipTarExtractor};
use crate::artefact::sha256_digest::{Sha256Digest, compute_sha256};
use crate::artefact::verification::{MissingChecksumAction, VerificationPolicy};
use crate::release::asset::{ReleaseAsset, ReleaseAssetSet};
use crate::release::platform::Platform;
use crate::release::selection::{SelectionError, select_asset};

/// Prefix for the temporary file holding the raw download.
const DOWNLOAD_PREFIX: &str = "updraft-download-";

/// Options for a single [`download_version`] call.
#[derive(Debug, Clone, Copy)]
pub struct DownloadOptions<'a> {
    /// Base name of the executable to pull out of the archive, normally the
    /// running program's own name.
    pub expected_executable: &'a str,
    /// What to do about checksums.
    pub policy: VerificationPolicy,
}

/// The verified executable produced by the pipeline.
///
/// The file at [`local_path`](Self::local_path) belongs to the caller, who
/// must move it into place or delete it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    local_path: PathBuf,
    is_executable_ready: bool,
}

impl ResolvedArtifact {
    fn from_extracted(local_path: PathBuf) -> std::io::Result<Self> {
        let is_executable_ready = has_execute_bit(&local_path)?;
        Ok(Self {
            local_path,
            is_executable_ready,
        })
    }

    /// Path of the extracted executable.
    #[must_use]
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Whether the file already carries an execute permission bit.
    #[must_use]
    pub fn is_executable_ready(&self) -> bool {
        self.is_executable_ready
    }

    /// Consume the artefact and return its path.
    #[must_use]
    pub fn into_path(self) -> PathBuf {
        self.local_path
    }
}

/// Errors arising from the download pipeline.
///
/// Each stage wraps its cause with the stage name so that a CLI can print a
/// single line explaining where the update failed.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// No asset suits the platform.
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// Downloading the asset failed.
    #[error("download asset: {0}")]
    Download(#[from] DownloadError),

    /// Retrieving or parsing the checksum manifest failed.
    #[error("fetch checksum: {0}")]
    Checksum(#[from] ChecksumError),

    /// The downloaded bytes do not hash to the published digest.
    #[error("checksum mismatch: expected={expected}, actual={actual}")]
    ChecksumMismatch {
        /// Digest published by the release.
        expected: Sha256Digest,
        /// Digest of the downloaded file.
        actual: Sha256Digest,
    },

    /// The release publishes no checksum and the policy requires one.
    #[error("no checksum published for {asset}; verification is required")]
    ChecksumMissing {
        /// Name of the selected asset.
        asset: String,
    },

    /// Extracting the executable failed.
    #[error("extract executable: {0}")]
    Extraction(#[from] ExtractionError),

    /// A local file operation failed.
    #[error("{context}: {source}")]
    Io {
        /// The operation that failed.
        context: &'static str,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Download, verify, and extract the release executable for `platform`
/// using the production HTTP downloader and gzip extractor.
///
/// # Errors
///
/// Returns a [`PipelineError`] naming the stage that failed.
pub fn download_version(
    assets: &ReleaseAssetSet,
    platform: &Platform,
    options: &DownloadOptions<'_>,
) -> Result<ResolvedArtifact, PipelineError> {
    download_version_with(
        assets,
        platform,
        options,
        &HttpDownloader::default(),
        &GzipTarExtractor,
    )
}

/// Testable inner function with injected dependencies.
///
/// The production entry point [`download_version`] delegates here with real
/// implementations; tests inject mocks.
///
/// # Errors
///
/// Returns a [`PipelineError`] naming the stage that failed.
pub fn download_version_with(
    assets: &ReleaseAssetSet,
    platform: &Platform,
    options: &DownloadOptions<'_>,
    downloader: &dyn ArtefactDownloader,
    extractor: &dyn ExecutableExtractor,
) -> Result<ResolvedArtifact, PipelineError> {
    // Step 1: Pick the platform asset.
    let asset = select_asset(assets, platform)?;
    log::debug!("selected asset {} for {platform}", asset.name());

    // Step 2: Download into a scoped temporary file.
    let download = tempfile::Builder::new()
        .prefix(DOWNLOAD_PREFIX)
        .tempfile()
        .map_err(|source| PipelineError::Io {
            context: "create download file",
            source,
        })?;
    downloader.download_to(asset.download_url(), download.path())?;

    // Steps 3-4: Locate and check the published checksum.
    verify_download(assets, asset, download.path(), options.policy, downloader)?;

    // Step 5: Extract the executable; the raw download is removed on drop.
    let executable =
        extractor.extract_likely_executable(download.path(), options.expected_executable)?;
    let artefact = match ResolvedArtifact::from_extracted(executable.clone()) {
        Ok(artefact) => artefact,
        Err(source) => {
            discard(&executable);
            return Err(PipelineError::Io {
                context: "inspect extracted executable",
                source,
            });
        }
    };

    log::debug!(
        "resolved {} to {}",
        asset.name(),
        artefact.local_path().display()
    );
    Ok(artefact)
}

/// Verify the downloaded file against the release's published checksum.
fn verify_download(
    assets: &ReleaseAssetSet,
    asset: &ReleaseAsset,
    download_path: &Path,
    policy: VerificationPolicy,
    downloader: &dyn ArtefactDownloader,
) -> Result<(), PipelineError> {
    let Some(checksum_asset) = resolve_checksum_asset(assets, asset.name()) else {
        return match policy.on_missing_checksum() {
            MissingChecksumAction::Reject => Err(PipelineError::ChecksumMissing {
                asset: asset.name().to_owned(),
            }),
            MissingChecksumAction::ProceedUnverified => {
                log::warn!("no checksum published for {}; skipping verification", asset.name());
                Ok(())
            }
        };
    };

    let expected = fetch_digest_for_file(downloader, checksum_asset.download_url(), asset.name())?;
    let actual = compute_sha256(download_path).map_err(|source| PipelineError::Io {
        context: "checksum download",
        source,
    })?;

    if actual != expected {
        return Err(PipelineError::ChecksumMismatch { expected, actual });
    }
    log::debug!("verified {} against {}", asset.name(), checksum_asset.name());
    Ok(())
}

/// Remove a file the caller will never see, logging rather than failing.
fn discard(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        log::warn!("failed to remove {}: {err}", path.display());
    }
}

/// Return the base name of the running executable.
///
/// Falls back to the first command-line argument when the platform cannot
/// report the executable path.
///
/// # Errors
///
/// Returns an error when neither source yields a base name.
pub fn current_executable_name() -> std::io::Result<String> {
    let from_exe = std::env::current_exe()
        .ok()
        .and_then(|path| base_name(&path));
    from_exe
        .or_else(|| std::env::args_os().next().and_then(|arg| base_name(Path::new(&arg))))
        .ok_or_else(|| std::io::Error::other("cannot determine the current executable name"))
}

fn base_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
}

#[cfg(unix)]
fn has_execute_bit(path: &Path) -> std::io::Result<bool> {
    use std::os::unix::fs::PermissionsExt;

    Ok(std::fs::metadata(path)?.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn has_execute_bit(path: &Path) -> std::io::Result<bool> {
    std::fs::metadata(path).map(|meta| meta.is_file())
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
