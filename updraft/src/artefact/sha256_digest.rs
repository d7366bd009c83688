//! SHA-256 digest newtype for artefact verification.
//!
//! Checksum manifests in the wild use either case, so the value is validated
//! as 64 hexadecimal characters and stored lowercased. Equality between two
//! [`Sha256Digest`] values is therefore case-insensitive with respect to the
//! text they were parsed from.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Error returned when a string is not a hex-encoded SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid SHA-256 digest: {reason}")]
pub struct InvalidDigest {
    reason: String,
}

/// A validated, lowercase hex-encoded SHA-256 digest.
///
/// # Examples
///
/// ```
/// use updraft::artefact::sha256_digest::Sha256Digest;
///
/// let upper: Sha256Digest = "AB".repeat(32).as_str().try_into().unwrap();
/// let lower: Sha256Digest = "ab".repeat(32).as_str().try_into().unwrap();
/// assert_eq!(upper, lower);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Return the digest as a lowercase hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<&str> for Sha256Digest {
    type Error = InvalidDigest;

    fn try_from(value: &str) -> Result<Self, InvalidDigest> {
        validate_sha256(value)?;
        Ok(Self(value.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for Sha256Digest {
    type Error = InvalidDigest;

    fn try_from(value: String) -> Result<Self, InvalidDigest> {
        Self::try_from(value.as_str())
    }
}

impl AsRef<str> for Sha256Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compute the SHA-256 digest of everything `reader` yields.
///
/// # Errors
///
/// Returns any I/O error raised while reading.
pub fn sha256_reader(reader: &mut dyn Read) -> std::io::Result<Sha256Digest> {
    let mut hasher = Sha256::new();
    std::io::copy(reader, &mut hasher)?;
    Ok(Sha256Digest(format!("{:x}", hasher.finalize())))
}

/// Compute the SHA-256 digest of the file at `path`.
///
/// # Errors
///
/// Returns any I/O error raised while opening or reading the file.
pub fn compute_sha256(path: &Path) -> std::io::Result<Sha256Digest> {
    let mut file = File::open(path)?;
    sha256_reader(&mut file)
}

/// Validate that `value` is a well-formed hex-encoded SHA-256 digest.
fn validate_sha256(value: &str) -> Result<(), InvalidDigest> {
    if value.len() != DIGEST_HEX_LEN {
        return Err(InvalidDigest {
            reason: format!(
                "expected {DIGEST_HEX_LEN} hex characters, got {}",
                value.len()
            ),
        });
    }
    if let Some(bad) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(InvalidDigest {
            reason: format!("non-hex character '{bad}'"),
        });
    }
    Ok(())
}
