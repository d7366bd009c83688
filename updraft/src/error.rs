//! Top-level error type for the updater facade and CLI.
//!
//! Each module owns a focused error enum; [`UpdaterError`] gathers them so
//! callers of [`Updater`](crate::updater::Updater) handle a single type.

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::package_manager::PackageManagerError;
use crate::pipeline::PipelineError;
use crate::release::source::SourceError;
use crate::update_check::UpdateCheckError;

/// Errors that can occur while checking for or fetching an update.
#[derive(Debug, Error)]
pub enum UpdaterError {
    /// Configuration could not be loaded or is incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The release source could not be queried.
    #[error("get latest version: {0}")]
    Source(#[from] SourceError),

    /// Versions could not be compared.
    #[error("update info from versions: {0}")]
    UpdateCheck(#[from] UpdateCheckError),

    /// Package-manager detection failed.
    #[error("detect package manager: {0}")]
    PackageManager(#[from] PackageManagerError),

    /// Downloading or verifying the release failed.
    #[error("download version: {0}")]
    Pipeline(#[from] PipelineError),

    /// The verified executable could not be moved to its destination.
    #[error("write executable to {path}: {source}")]
    Persist {
        /// The intended destination.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`UpdaterError`].
pub type Result<T> = std::result::Result<T, UpdaterError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::selection::SelectionError;

    #[test]
    fn pipeline_errors_name_the_stage() {
        let err = UpdaterError::from(PipelineError::from(SelectionError::NoMatchingArchitectures {
            os: "linux".to_owned(),
            arch: "riscv64".to_owned(),
        }));
        let msg = err.to_string();
        assert!(msg.starts_with("download version: "));
        assert!(msg.contains("riscv64"));
    }

    #[test]
    fn config_errors_are_transparent() {
        let err = UpdaterError::from(ConfigError::NoReleaseSource);
        assert_eq!(err.to_string(), ConfigError::NoReleaseSource.to_string());
    }

    #[test]
    fn persist_error_names_destination() {
        let err = UpdaterError::Persist {
            path: Utf8PathBuf::from("/usr/local/bin/tool"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().contains("/usr/local/bin/tool"));
    }
}
