//! Checksum manifest parsing.
//!
//! Supports the `<hex-digest><whitespace><path>` line format written by
//! `sha256sum` and GoReleaser. Lines that do not split into exactly two
//! whitespace-separated tokens are skipped rather than rejected, so comment
//! lines and blank lines are harmless.

use super::download::{ArtefactDownloader, DownloadError};
use super::sha256_digest::{InvalidDigest, Sha256Digest};
use std::io::{BufRead, BufReader, Read};

/// One parsed manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumRecord {
    /// The digest exactly as written in the manifest.
    pub digest_hex: String,
    /// The path token, trimmed.
    pub filename: String,
}

impl ChecksumRecord {
    /// Parse a single manifest line.
    ///
    /// Returns `None` unless the line has exactly two whitespace-separated
    /// tokens.
    ///
    /// # Examples
    ///
    /// ```
    /// use updraft::artefact::checksum_manifest::ChecksumRecord;
    ///
    /// let record = ChecksumRecord::parse_line("abc123  dist/foo.tar.gz").unwrap();
    /// assert_eq!(record.digest_hex, "abc123");
    /// assert_eq!(record.filename, "dist/foo.tar.gz");
    /// assert!(ChecksumRecord::parse_line("# generated by goreleaser").is_none());
    /// ```
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let digest = tokens.next()?;
        let path = tokens.next()?;
        if tokens.next().is_some() {
            return None;
        }
        Some(Self {
            digest_hex: digest.to_owned(),
            filename: path.trim().to_owned(),
        })
    }

    /// Whether this record describes `target_filename`.
    ///
    /// A `*` binary-mode marker before the path still matches, since only the
    /// suffix is compared.
    #[must_use]
    pub fn matches(&self, target_filename: &str) -> bool {
        self.filename.ends_with(target_filename)
    }
}

/// Errors arising from checksum manifest retrieval and parsing.
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    /// No line in the manifest names the target file.
    #[error("unsupported checksum format: no entry for {filename}")]
    UnsupportedChecksumFormat {
        /// The filename that was searched for.
        filename: String,
    },

    /// The matching line carries something other than a SHA-256 digest.
    #[error("checksum entry for {filename} is invalid: {source}")]
    InvalidDigest {
        /// The filename whose entry was malformed.
        filename: String,
        /// The validation failure.
        #[source]
        source: InvalidDigest,
    },

    /// The manifest could not be downloaded.
    #[error("download checksum manifest: {0}")]
    Download(#[from] DownloadError),

    /// Reading the manifest body failed.
    #[error("read checksum manifest: {0}")]
    Io(#[from] std::io::Error),
}

/// Scan `manifest` line by line for the digest of `target_filename`.
///
/// The first matching line wins; later lines are not read.
///
/// # Errors
///
/// Returns [`ChecksumError::UnsupportedChecksumFormat`] when no line
/// matches, [`ChecksumError::InvalidDigest`] when the matching line has a
/// malformed digest, and [`ChecksumError::Io`] on read failures.
pub fn find_digest(
    manifest: impl Read,
    target_filename: &str,
) -> Result<Sha256Digest, ChecksumError> {
    for line in BufReader::new(manifest).split(b'\n') {
        let line = line?;
        // Undecodable lines cannot name the target; skip them like any
        // other malformed line.
        let Ok(text) = std::str::from_utf8(&line) else {
            continue;
        };
        let Some(record) = ChecksumRecord::parse_line(text) else {
            continue;
        };
        if record.matches(target_filename) {
            return Sha256Digest::try_from(record.digest_hex).map_err(|source| {
                ChecksumError::InvalidDigest {
                    filename: target_filename.to_owned(),
                    source,
                }
            });
        }
    }

    Err(ChecksumError::UnsupportedChecksumFormat {
        filename: target_filename.to_owned(),
    })
}

/// Download the manifest at `manifest_url` and extract the digest of
/// `target_filename`.
///
/// # Errors
///
/// Returns [`ChecksumError::Download`] when the manifest cannot be fetched,
/// plus every error [`find_digest`] can return.
pub fn fetch_digest_for_file(
    downloader: &dyn ArtefactDownloader,
    manifest_url: &str,
    target_filename: &str,
) -> Result<Sha256Digest, ChecksumError> {
    log::debug!("fetching checksum manifest {manifest_url} for {target_filename}");
    let body = downloader.open(manifest_url)?;
    find_digest(body, target_filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artefact::download::MockArtefactDownloader;
    use rstest::rstest;
    use std::io::Cursor;

    const FOO_SHA: &str = "1111111111111111111111111111111111111111111111111111111111111111";
    const BAR_SHA: &str = "2222222222222222222222222222222222222222222222222222222222222222";

    #[rstest]
    #[case::two_spaces("abc  foo.tar.gz", Some(("abc", "foo.tar.gz")))]
    #[case::tab("abc\tfoo.tar.gz", Some(("abc", "foo.tar.gz")))]
    #[case::binary_marker("abc *foo.tar.gz", Some(("abc", "*foo.tar.gz")))]
    #[case::trailing_space("abc foo.tar.gz   ", Some(("abc", "foo.tar.gz")))]
    #[case::blank("", None)]
    #[case::single_token("abc", None)]
    #[case::three_tokens("abc foo.tar.gz extra", None)]
    fn parses_lines(#[case] line: &str, #[case] expected: Option<(&str, &str)>) {
        let parsed = ChecksumRecord::parse_line(line);
        let actual = parsed
            .as_ref()
            .map(|r| (r.digest_hex.as_str(), r.filename.as_str()));
        assert_eq!(actual, expected);
    }

    #[test]
    fn finds_digest_for_matching_suffix() {
        let manifest = format!("{BAR_SHA}  bar.tar.gz\n{FOO_SHA}  dist/foo.tar.gz\n");
        let digest = find_digest(Cursor::new(manifest), "foo.tar.gz").expect("digest");
        assert_eq!(digest.as_str(), FOO_SHA);
    }

    #[test]
    fn first_matching_line_wins() {
        let manifest = format!("{FOO_SHA}  foo.tar.gz\n{BAR_SHA}  foo.tar.gz\n");
        let digest = find_digest(Cursor::new(manifest), "foo.tar.gz").expect("digest");
        assert_eq!(digest.as_str(), FOO_SHA);
    }

    #[test]
    fn stops_reading_after_first_match() {
        // A read failure after the match must not surface.
        struct FailAfter(Cursor<Vec<u8>>);
        impl Read for FailAfter {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                match self.0.read(buf)? {
                    0 => Err(std::io::Error::other("truncated")),
                    n => Ok(n),
                }
            }
        }
        let manifest = format!("{FOO_SHA}  foo.tar.gz\n");
        let reader = FailAfter(Cursor::new(manifest.into_bytes()));
        assert!(find_digest(reader, "foo.tar.gz").is_ok());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let manifest = format!("# checksums\n\nnot a checksum line\n{FOO_SHA} foo.tar.gz\n");
        let digest = find_digest(Cursor::new(manifest), "foo.tar.gz").expect("digest");
        assert_eq!(digest.as_str(), FOO_SHA);
    }

    #[test]
    fn non_utf8_lines_are_skipped() {
        let mut manifest = b"\xff\xfe garbage\n".to_vec();
        manifest.extend_from_slice(format!("{FOO_SHA}  foo.tar.gz\n").as_bytes());
        let digest = find_digest(Cursor::new(manifest), "foo.tar.gz").expect("digest");
        assert_eq!(digest.as_str(), FOO_SHA);
    }

    #[test]
    fn crlf_line_endings_are_accepted() {
        let manifest = format!("{BAR_SHA}  bar.tar.gz\r\n{FOO_SHA}  foo.tar.gz\r\n");
        let digest = find_digest(Cursor::new(manifest), "foo.tar.gz").expect("digest");
        assert_eq!(digest.as_str(), FOO_SHA);
    }

    #[test]
    fn missing_entry_is_unsupported_format() {
        let manifest = format!("{BAR_SHA}  bar.tar.gz\n");
        let result = find_digest(Cursor::new(manifest), "foo.tar.gz");
        assert!(matches!(
            result,
            Err(ChecksumError::UnsupportedChecksumFormat { .. })
        ));
    }

    #[test]
    fn non_hex_digest_is_invalid() {
        let result = find_digest(Cursor::new("zzzz  foo.tar.gz\n"), "foo.tar.gz");
        assert!(matches!(result, Err(ChecksumError::InvalidDigest { .. })));
    }

    #[test]
    fn uppercase_manifest_digest_is_accepted() {
        let manifest = format!("{}  foo.tar.gz\n", FOO_SHA.replace('1', "A"));
        let digest = find_digest(Cursor::new(manifest), "foo.tar.gz").expect("digest");
        assert_eq!(digest.as_str(), "a".repeat(64));
    }

    #[test]
    fn fetch_reads_manifest_from_downloader() {
        let mut downloader = MockArtefactDownloader::new();
        downloader
            .expect_open()
            .withf(|url| url == "https://example.test/checksums.txt")
            .returning(|_| {
                let body = format!("{FOO_SHA}  foo.tar.gz\n");
                Ok(Box::new(Cursor::new(body.into_bytes())))
            });
        let digest =
            fetch_digest_for_file(&downloader, "https://example.test/checksums.txt", "foo.tar.gz")
                .expect("digest");
        assert_eq!(digest.as_str(), FOO_SHA);
    }

    #[test]
    fn fetch_surfaces_download_errors() {
        let mut downloader = MockArtefactDownloader::new();
        downloader.expect_open().returning(|url| {
            Err(DownloadError::NotFound {
                url: url.to_owned(),
            })
        });
        let result = fetch_digest_for_file(&downloader, "https://example.test/c.txt", "foo");
        assert!(matches!(result, Err(ChecksumError::Download(_))));
    }
}
