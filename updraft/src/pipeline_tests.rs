//! Tests for the download and verification pipeline.

use super::*;
use crate::artefact::download::MockArtefactDownloader;
use crate::artefact::extraction::MockExecutableExtractor;
use crate::test_utils::{StubDownloader, TarEntry, sha256_hex, tar_gz_bytes};
use rstest::{fixture, rstest};
use std::path::PathBuf;

const ARCHIVE: &str = "myapp_linux_amd64.tar.gz";
const ARCHIVE_URL: &str = "https://example.test/v1/myapp_linux_amd64.tar.gz";
const CHECKSUMS_URL: &str = "https://example.test/v1/checksums.txt";
const PER_ASSET_URL: &str = "https://example.test/v1/myapp_linux_amd64.tar.gz.sha256";
const SCRIPT: &[u8] = b"#!/bin/sh\necho hello\n";

fn linux() -> Platform {
    Platform::new("linux", "amd64")
}

fn options(policy: VerificationPolicy) -> DownloadOptions<'static> {
    DownloadOptions {
        expected_executable: "myapp",
        policy,
    }
}

fn assert_downloads_removed(downloader: &StubDownloader) {
    let written = downloader.destinations();
    assert!(!written.is_empty(), "archive was never downloaded");
    for path in written {
        assert!(!path.exists(), "raw download {} should be deleted", path.display());
    }
}

#[fixture]
fn archive() -> Vec<u8> {
    tar_gz_bytes(&[
        TarEntry::dir("dist"),
        TarEntry::file("dist/README.md", 0o644, b"docs"),
        TarEntry::file("dist/myapp", 0o755, SCRIPT),
    ])
    .expect("archive")
}

fn assets_with_checksums() -> ReleaseAssetSet {
    ReleaseAssetSet::new(vec![
        ReleaseAsset::uploaded("myapp_darwin_amd64.tar.gz", "https://example.test/v1/darwin"),
        ReleaseAsset::uploaded(ARCHIVE, ARCHIVE_URL),
        ReleaseAsset::uploaded("checksums.txt", CHECKSUMS_URL),
    ])
}

fn assets_without_checksums() -> ReleaseAssetSet {
    ReleaseAssetSet::new(vec![ReleaseAsset::uploaded(ARCHIVE, ARCHIVE_URL)])
}

/// Remove the executable a successful run hands back.
fn cleanup(artefact: ResolvedArtifact) {
    std::fs::remove_file(artefact.into_path()).expect("remove extracted executable");
}

#[rstest]
fn verified_download_yields_executable(archive: Vec<u8>) {
    let manifest = format!(
        "{}  myapp_darwin_amd64.tar.gz\n{}  {ARCHIVE}\n",
        sha256_hex(b"darwin"),
        sha256_hex(&archive)
    );
    let downloader = StubDownloader::new()
        .with_body(ARCHIVE_URL, archive)
        .with_body(CHECKSUMS_URL, manifest);

    let artefact = download_version_with(
        &assets_with_checksums(),
        &linux(),
        &options(VerificationPolicy::default()),
        &downloader,
        &GzipTarExtractor,
    )
    .expect("pipeline succeeds");

    assert_eq!(std::fs::read(artefact.local_path()).expect("read"), SCRIPT);
    #[cfg(unix)]
    assert!(artefact.is_executable_ready());
    assert_eq!(downloader.requests(), vec![ARCHIVE_URL, CHECKSUMS_URL]);
    cleanup(artefact);
}

#[rstest]
fn per_asset_checksum_is_preferred(archive: Vec<u8>) {
    let assets = ReleaseAssetSet::new(vec![
        ReleaseAsset::uploaded(ARCHIVE, ARCHIVE_URL),
        ReleaseAsset::uploaded("checksums.txt", CHECKSUMS_URL),
        ReleaseAsset::uploaded("myapp_linux_amd64.tar.gz.sha256", PER_ASSET_URL),
    ]);
    let per_asset = format!("{} {ARCHIVE}\n", sha256_hex(&archive));
    let downloader = StubDownloader::new()
        .with_body(ARCHIVE_URL, archive)
        .with_body(PER_ASSET_URL, per_asset);

    let artefact = download_version_with(
        &assets,
        &linux(),
        &options(VerificationPolicy::default()),
        &downloader,
        &GzipTarExtractor,
    )
    .expect("pipeline succeeds");

    assert_eq!(downloader.requests(), vec![ARCHIVE_URL, PER_ASSET_URL]);
    cleanup(artefact);
}

#[rstest]
fn checksum_mismatch_stops_before_extraction(archive: Vec<u8>) {
    let manifest = format!("{}  {ARCHIVE}\n", sha256_hex(b"something else"));
    let downloader = StubDownloader::new()
        .with_body(ARCHIVE_URL, archive.clone())
        .with_body(CHECKSUMS_URL, manifest);
    let mut extractor = MockExecutableExtractor::new();
    extractor.expect_extract_likely_executable().never();

    let err = download_version_with(
        &assets_with_checksums(),
        &linux(),
        &options(VerificationPolicy::default()),
        &downloader,
        &extractor,
    )
    .expect_err("mismatch");

    match err {
        PipelineError::ChecksumMismatch { expected, actual } => {
            assert_eq!(expected.as_str(), sha256_hex(b"something else"));
            assert_eq!(actual.as_str(), sha256_hex(&archive));
        }
        other => panic!("expected checksum mismatch, got {other}"),
    }
    assert_downloads_removed(&downloader);
}

#[rstest]
fn uppercase_published_digest_matches(archive: Vec<u8>) {
    let manifest = format!("{}  {ARCHIVE}\n", sha256_hex(&archive).to_uppercase());
    let downloader = StubDownloader::new()
        .with_body(ARCHIVE_URL, archive)
        .with_body(CHECKSUMS_URL, manifest);

    let artefact = download_version_with(
        &assets_with_checksums(),
        &linux(),
        &options(VerificationPolicy::default()),
        &downloader,
        &GzipTarExtractor,
    )
    .expect("case-insensitive digest");
    cleanup(artefact);
}

#[rstest]
fn malformed_manifest_is_unsupported_format(archive: Vec<u8>) {
    let downloader = StubDownloader::new()
        .with_body(ARCHIVE_URL, archive)
        .with_body(CHECKSUMS_URL, "sha256 abc def\n");

    let err = download_version_with(
        &assets_with_checksums(),
        &linux(),
        &options(VerificationPolicy::default()),
        &downloader,
        &GzipTarExtractor,
    )
    .expect_err("unsupported format");

    assert!(matches!(
        err,
        PipelineError::Checksum(ChecksumError::UnsupportedChecksumFormat { .. })
    ));
    assert_downloads_removed(&downloader);
}

#[rstest]
fn missing_checksum_is_rejected_when_required(archive: Vec<u8>) {
    let downloader = StubDownloader::new().with_body(ARCHIVE_URL, archive);
    let mut extractor = MockExecutableExtractor::new();
    extractor.expect_extract_likely_executable().never();

    let err = download_version_with(
        &assets_without_checksums(),
        &linux(),
        &options(VerificationPolicy::default()),
        &downloader,
        &extractor,
    )
    .expect_err("checksum required");

    assert!(matches!(err, PipelineError::ChecksumMissing { ref asset } if asset == ARCHIVE));
    assert_downloads_removed(&downloader);
}

#[rstest]
fn missing_checksum_proceeds_when_optional(archive: Vec<u8>) {
    let downloader = StubDownloader::new().with_body(ARCHIVE_URL, archive);

    let artefact = download_version_with(
        &assets_without_checksums(),
        &linux(),
        &options(VerificationPolicy::new(false)),
        &downloader,
        &GzipTarExtractor,
    )
    .expect("unverified download allowed");

    assert_eq!(downloader.requests(), vec![ARCHIVE_URL]);
    cleanup(artefact);
}

#[test]
fn selection_failure_downloads_nothing() {
    let mut downloader = MockArtefactDownloader::new();
    downloader.expect_download_to().never();
    downloader.expect_open().never();
    let extractor = MockExecutableExtractor::new();

    let err = download_version_with(
        &assets_with_checksums(),
        &Platform::new("windows", "arm64"),
        &options(VerificationPolicy::default()),
        &downloader,
        &extractor,
    )
    .expect_err("no asset for platform");

    assert!(matches!(
        err,
        PipelineError::Selection(SelectionError::NoMatchingArchitectures { .. })
    ));
}

#[test]
fn empty_release_reports_no_assets() {
    let err = download_version_with(
        &ReleaseAssetSet::default(),
        &linux(),
        &options(VerificationPolicy::default()),
        &MockArtefactDownloader::new(),
        &MockExecutableExtractor::new(),
    )
    .expect_err("no assets");
    assert!(matches!(err, PipelineError::Selection(SelectionError::NoAssets)));
}

#[test]
fn download_failure_is_wrapped() {
    let downloader = StubDownloader::new();

    let err = download_version_with(
        &assets_with_checksums(),
        &linux(),
        &options(VerificationPolicy::default()),
        &downloader,
        &GzipTarExtractor,
    )
    .expect_err("asset missing from host");

    assert!(matches!(err, PipelineError::Download(DownloadError::NotFound { .. })));
    assert!(err.to_string().starts_with("download asset: "));
}

#[test]
fn non_gzip_download_is_unknown_archive() {
    let body = b"plain binary, not an archive".to_vec();
    let manifest = format!("{}  {ARCHIVE}\n", sha256_hex(&body));
    let downloader = StubDownloader::new()
        .with_body(ARCHIVE_URL, body)
        .with_body(CHECKSUMS_URL, manifest);

    let err = download_version_with(
        &assets_with_checksums(),
        &linux(),
        &options(VerificationPolicy::default()),
        &downloader,
        &GzipTarExtractor,
    )
    .expect_err("not gzip");

    assert!(matches!(
        err,
        PipelineError::Extraction(ExtractionError::UnknownArchiveType)
    ));
    assert_downloads_removed(&downloader);
}

#[test]
fn archive_without_executable_is_no_matching_entry() {
    let body = tar_gz_bytes(&[TarEntry::file("myapp", 0o644, b"not executable")]).expect("archive");
    let downloader = StubDownloader::new().with_body(ARCHIVE_URL, body);

    let err = download_version_with(
        &assets_without_checksums(),
        &linux(),
        &options(VerificationPolicy::new(false)),
        &downloader,
        &GzipTarExtractor,
    )
    .expect_err("no executable entry");

    assert!(matches!(
        err,
        PipelineError::Extraction(ExtractionError::NoMatchingEntry { .. })
    ));
    assert_downloads_removed(&downloader);
}

#[rstest]
fn raw_download_is_removed_after_extraction(archive: Vec<u8>) {
    let downloader = StubDownloader::new().with_body(ARCHIVE_URL, archive);
    let mut extractor = MockExecutableExtractor::new();
    let seen: std::rc::Rc<std::cell::RefCell<Option<PathBuf>>> = std::rc::Rc::default();
    let seen_in_mock = std::rc::Rc::clone(&seen);
    let output = tempfile::NamedTempFile::new().expect("output file");
    let output_path = output.path().to_path_buf();
    extractor
        .expect_extract_likely_executable()
        .returning_st(move |archive_path, _| {
            assert!(archive_path.exists());
            *seen_in_mock.borrow_mut() = Some(archive_path.to_path_buf());
            Ok(output_path.clone())
        });

    let artefact = download_version_with(
        &assets_without_checksums(),
        &linux(),
        &options(VerificationPolicy::new(false)),
        &downloader,
        &extractor,
    )
    .expect("pipeline succeeds");

    let download_path = seen.borrow().clone().expect("extractor was called");
    assert!(!download_path.exists(), "raw download should be deleted");
    assert_eq!(artefact.local_path(), output.path());
}

#[test]
fn current_executable_name_is_a_base_name() {
    let name = current_executable_name().expect("executable name");
    assert!(!name.is_empty());
    assert!(!name.contains(std::path::MAIN_SEPARATOR));
}
