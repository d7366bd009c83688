//! Updater configuration.
//!
//! Settings come from an optional TOML file. The file is located by, in
//! order: an explicit path (the `--config` flag), the `UPDRAFT_CONFIG`
//! environment variable, and `config.toml` in the platform configuration
//! directory. The first two must exist when given; the last is used only
//! when present. Command-line flags override file values.

use std::path::PathBuf;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::artefact::download::DEFAULT_TIMEOUT;
use crate::artefact::verification::VerificationPolicy;
use crate::dirs::BaseDirs;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "UPDRAFT_CONFIG";

/// File name looked up in the platform configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors arising from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("read config {path}: {source}")]
    Read {
        /// The file that was read.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid.
    #[error("parse config {path}: {source}")]
    Parse {
        /// The file that was parsed.
        path: Utf8PathBuf,
        /// The TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A configuration path is not valid UTF-8.
    #[error("config path is not valid UTF-8: {}", path.display())]
    NonUtf8Path {
        /// The offending path.
        path: PathBuf,
    },

    /// Neither a GitHub repository nor an OCI artefact is configured.
    #[error("no release source configured; set github_repo or oci_artifact")]
    NoReleaseSource,

    /// Both a GitHub repository and an OCI artefact are configured.
    #[error("github_repo and oci_artifact are mutually exclusive")]
    ConflictingReleaseSources,
}

/// Settings for an [`Updater`](crate::updater::Updater).
///
/// # Examples
///
/// ```
/// use updraft::config::UpdaterConfig;
///
/// let config = UpdaterConfig::from_toml(r#"github_repo = "octo-org/octo-tool""#).unwrap();
/// assert_eq!(config.github_repo.as_deref(), Some("octo-org/octo-tool"));
/// assert!(config.require_checksum);
/// assert_eq!(config.http_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdaterConfig {
    /// GitHub repository publishing releases, `owner/repo` or
    /// `host/owner/repo`.
    pub github_repo: Option<String>,
    /// OCI repository publishing releases, `registry/repository`.
    pub oci_artifact: Option<String>,
    /// Homebrew formula that may own the installed binary.
    pub homebrew_formula: Option<String>,
    /// Per-request HTTP timeout in seconds.
    pub http_timeout_secs: u64,
    /// Whether a release without a checksum is rejected.
    pub require_checksum: bool,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            github_repo: None,
            oci_artifact: None,
            homebrew_formula: None,
            http_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            require_checksum: true,
        }
    }
}

impl UpdaterConfig {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML or unknown keys.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: Utf8PathBuf::from("<inline>"),
            source,
        })
    }

    /// Read and parse the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// The HTTP timeout as a [`Duration`].
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// The checksum policy implied by `require_checksum`.
    #[must_use]
    pub const fn verification_policy(&self) -> VerificationPolicy {
        VerificationPolicy::new(self.require_checksum)
    }
}

/// Where configuration was found and whether it must exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    /// Path of the configuration file.
    pub path: Utf8PathBuf,
    /// Whether a missing file is an error.
    pub required: bool,
}

/// Work out which configuration file applies.
///
/// Returns `None` when no explicit path or environment variable is given and
/// the platform configuration directory is unknown.
///
/// # Errors
///
/// Returns [`ConfigError::NonUtf8Path`] when the chosen path is not UTF-8.
pub fn resolve_config_path(
    explicit: Option<&Utf8Path>,
    dirs: &dyn BaseDirs,
) -> Result<Option<ConfigLocation>, ConfigError> {
    if let Some(path) = explicit {
        return Ok(Some(ConfigLocation {
            path: path.to_owned(),
            required: true,
        }));
    }

    if let Some(value) = std::env::var_os(CONFIG_ENV).filter(|value| !value.is_empty()) {
        let path = utf8(PathBuf::from(value))?;
        return Ok(Some(ConfigLocation {
            path,
            required: true,
        }));
    }

    dirs.updraft_config_dir()
        .map(|dir| {
            utf8(dir.join(CONFIG_FILE_NAME)).map(|path| ConfigLocation {
                path,
                required: false,
            })
        })
        .transpose()
}

/// Resolve and load configuration, falling back to defaults when no file
/// applies.
///
/// # Errors
///
/// Returns a [`ConfigError`] when a required file is missing or any chosen
/// file cannot be read or parsed.
pub fn load_config(
    explicit: Option<&Utf8Path>,
    dirs: &dyn BaseDirs,
) -> Result<UpdaterConfig, ConfigError> {
    match resolve_config_path(explicit, dirs)? {
        Some(location) if location.required || location.path.is_file() => {
            log::debug!("loading configuration from {}", location.path);
            UpdaterConfig::load(&location.path)
        }
        _ => Ok(UpdaterConfig::default()),
    }
}

fn utf8(path: PathBuf) -> Result<Utf8PathBuf, ConfigError> {
    Utf8PathBuf::from_path_buf(path).map_err(|path| ConfigError::NonUtf8Path { path })
}
