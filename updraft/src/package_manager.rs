//! Detection of external package managers that own the installed binary.
//!
//! When a tool was installed by Homebrew (or a similar manager), replacing
//! the binary in place would fight the manager. Detection lets the updater
//! point the user at the manager's own upgrade command instead.

use crate::exec::{CommandExecutor, ExecError, SystemCommandExecutor};
use serde::Deserialize;

/// Errors arising from package-manager detection.
#[derive(Debug, thiserror::Error)]
pub enum PackageManagerError {
    /// The manager's CLI could not be run.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// The manager's CLI exited unsuccessfully.
    #[error("{tool} exited with {status}: {stderr}")]
    CommandFailed {
        /// The manager being queried.
        tool: &'static str,
        /// The exit status as reported by the OS.
        status: String,
        /// Trimmed standard error output.
        stderr: String,
    },

    /// The manager's output could not be parsed.
    #[error("unmarshal {tool} output: {source}")]
    Parse {
        /// The manager being queried.
        tool: &'static str,
        /// The JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// A package manager that may have installed the running program.
#[cfg_attr(test, mockall::automock)]
pub trait ExternalPackageManager {
    /// Whether this manager reports the program as installed.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager could not be queried.
    fn is_installed(&self) -> Result<bool, PackageManagerError>;

    /// The command a user should run to upgrade through this manager.
    fn upgrade_command(&self) -> String;
}

/// Homebrew formula detection via `brew info <formula> --json`.
pub struct HomebrewPackageManager {
    formula: String,
    executor: Box<dyn CommandExecutor>,
}

impl HomebrewPackageManager {
    /// Detect `formula` using the host's `brew`.
    #[must_use]
    pub fn new(formula: impl Into<String>) -> Self {
        Self::with_executor(formula, Box::new(SystemCommandExecutor::default()))
    }

    /// Detect `formula` using a custom command executor.
    #[must_use]
    pub fn with_executor(formula: impl Into<String>, executor: Box<dyn CommandExecutor>) -> Self {
        Self {
            formula: formula.into(),
            executor,
        }
    }

    /// The formula being checked.
    #[must_use]
    pub fn formula(&self) -> &str {
        &self.formula
    }
}

impl std::fmt::Debug for HomebrewPackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomebrewPackageManager")
            .field("formula", &self.formula)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct HomebrewFormulaInfo {
    #[serde(default)]
    installed: Vec<serde_json::Value>,
}

impl ExternalPackageManager for HomebrewPackageManager {
    fn is_installed(&self) -> Result<bool, PackageManagerError> {
        // Without a brew binary the program cannot have come from Homebrew.
        let Some(brew) = self.executor.locate("brew") else {
            return Ok(false);
        };

        let output = self
            .executor
            .run(&brew, &["info", self.formula.as_str(), "--json"])?;
        if !output.status.success() {
            return Err(PackageManagerError::CommandFailed {
                tool: "brew",
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        parse_brew_info(&output.stdout)
    }

    fn upgrade_command(&self) -> String {
        format!("brew upgrade {}", self.formula)
    }
}

/// Interpret `brew info --json` output: installed iff the first formula lists
/// at least one installed version.
fn parse_brew_info(stdout: &[u8]) -> Result<bool, PackageManagerError> {
    let infos: Vec<HomebrewFormulaInfo> =
        serde_json::from_slice(stdout).map_err(|source| PackageManagerError::Parse {
            tool: "brew",
            source,
        })?;
    Ok(infos
        .first()
        .is_some_and(|info| !info.installed.is_empty()))
}

/// Whether the program may replace itself: false as soon as any manager
/// reports the program as installed.
///
/// # Errors
///
/// Propagates the first detection error.
pub fn can_support_upgrade(
    managers: &[Box<dyn ExternalPackageManager>],
) -> Result<bool, PackageManagerError> {
    for manager in managers {
        if manager.is_installed()? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// The upgrade command of the first manager that owns the program.
///
/// Detection errors are treated as "not owned" and end the search.
#[must_use]
pub fn external_upgrade_command(managers: &[Box<dyn ExternalPackageManager>]) -> Option<String> {
    for manager in managers {
        match manager.is_installed() {
            Ok(true) => return Some(manager.upgrade_command()),
            Ok(false) => {}
            Err(err) => {
                log::debug!("package manager detection failed: {err}");
                return None;
            }
        }
    }
    None
}
