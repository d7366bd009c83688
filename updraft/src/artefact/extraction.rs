//! Executable extraction from downloaded release archives.
//!
//! Only gzip-compressed tar archives are understood. The archive is scanned
//! in order for the first regular file that is executable and whose base
//! name equals the expected executable name; that entry alone is written to
//! a fresh temporary file with its permission bits preserved.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Any of the owner, group, or other execute bits.
const EXECUTABLE_BITS: u32 = 0o111;

/// Prefix for temporary files holding extracted executables.
const TEMP_PREFIX: &str = "updraft-";

/// Trait for extracting the executable payload of an archive, enabling test
/// mocking.
///
/// # Examples
///
/// ```
/// use updraft::artefact::extraction::GzipTarExtractor;
///
/// let extractor = GzipTarExtractor;
/// // Use extractor.extract_likely_executable(archive_path, "myapp") in production
/// # let _ = extractor;
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ExecutableExtractor {
    /// Extract the entry of `archive_path` that looks like
    /// `expected_executable` into a new temporary file and return its path.
    ///
    /// The caller owns the returned file and must delete it.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::UnknownArchiveType`] when the file is not
    /// gzip-compressed, [`ExtractionError::NoMatchingEntry`] when no entry
    /// qualifies, and [`ExtractionError::Io`] on any I/O failure.
    fn extract_likely_executable(
        &self,
        archive_path: &Path,
        expected_executable: &str,
    ) -> Result<PathBuf, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The file is not a container format this crate understands.
    #[error("unknown archive type")]
    UnknownArchiveType,

    /// The archive was readable but no entry looks like the executable.
    #[error("unable to find matching file in archive: expected executable {expected}")]
    NoMatchingEntry {
        /// The executable base name that was searched for.
        expected: String,
    },

    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default extractor using the `flate2` and `tar` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipTarExtractor;

impl ExecutableExtractor for GzipTarExtractor {
    fn extract_likely_executable(
        &self,
        archive_path: &Path,
        expected_executable: &str,
    ) -> Result<PathBuf, ExtractionError> {
        let file = File::open(archive_path)?;
        let decoder = GzDecoder::new(BufReader::new(file));
        if decoder.header().is_none() {
            return Err(ExtractionError::UnknownArchiveType);
        }

        let mut archive = tar::Archive::new(decoder);
        for entry_result in archive.entries()? {
            let mut entry = entry_result?;
            if !entry.header().entry_type().is_file() {
                continue;
            }

            let mode = entry.header().mode()?;
            let entry_path = entry.path()?.into_owned();
            if !is_likely_executable(mode, &entry_path, expected_executable) {
                log::trace!("skipping archive entry {}", entry_path.display());
                continue;
            }

            let mut temp = tempfile::Builder::new().prefix(TEMP_PREFIX).tempfile()?;
            std::io::copy(&mut entry, temp.as_file_mut())?;
            set_mode(temp.as_file(), mode)?;
            let (_file, path) = temp.keep().map_err(|e| ExtractionError::Io(e.error))?;
            log::debug!(
                "extracted {} from {} to {}",
                entry_path.display(),
                archive_path.display(),
                path.display()
            );
            return Ok(path);
        }

        Err(ExtractionError::NoMatchingEntry {
            expected: expected_executable.to_owned(),
        })
    }
}

/// Extract the likely executable from `archive_path` with the default
/// [`GzipTarExtractor`].
///
/// # Errors
///
/// See [`ExecutableExtractor::extract_likely_executable`].
pub fn extract_likely_executable(
    archive_path: &Path,
    expected_executable: &str,
) -> Result<PathBuf, ExtractionError> {
    GzipTarExtractor.extract_likely_executable(archive_path, expected_executable)
}

/// Whether an archive entry is the executable being looked for.
///
/// The entry must carry at least one execute bit and its base name must equal
/// `expected_executable` exactly.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use updraft::artefact::extraction::is_likely_executable;
///
/// assert!(is_likely_executable(0o755, Path::new("dist/myapp"), "myapp"));
/// assert!(!is_likely_executable(0o644, Path::new("dist/myapp"), "myapp"));
/// assert!(!is_likely_executable(0o755, Path::new("dist/README"), "myapp"));
/// ```
#[must_use]
pub fn is_likely_executable(mode: u32, entry_path: &Path, expected_executable: &str) -> bool {
    mode & EXECUTABLE_BITS != 0
        && entry_path
            .file_name()
            .is_some_and(|name| name == expected_executable)
}

#[cfg(unix)]
fn set_mode(file: &File, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    file.set_permissions(std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &File, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
