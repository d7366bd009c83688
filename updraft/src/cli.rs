//! CLI argument definitions for updraft.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint so the flag-to-configuration rules can be tested
//! without running a command.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

use crate::config::UpdaterConfig;
use crate::release::platform::Platform;

/// Check for, download and verify releases of a command-line tool.
#[derive(Parser, Debug)]
#[command(name = "updraft")]
#[command(version, about)]
#[command(long_about = concat!(
    "Check for, download and verify releases of a command-line tool.\n\n",
    "updraft asks a GitHub repository or an OCI registry for the newest ",
    "release, picks the archive built for this machine, checks it against the ",
    "published SHA-256 checksum and extracts the executable.\n\n",
    "Settings are read from --config, then $UPDRAFT_CONFIG, then config.toml ",
    "in the platform configuration directory. Flags override the file.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Check whether a newer release exists:\n",
    "    $ updraft --github-repo octo-org/octo-tool check --current-version 1.2.0\n\n",
    "  Fetch the latest release's executable into ./octo-tool:\n",
    "    $ updraft --github-repo octo-org/octo-tool download --executable octo-tool -o octo-tool\n\n",
    "  Use an OCI registry instead:\n",
    "    $ updraft --oci-artifact ghcr.io/octo-org/octo-tool check --current-version 1.2.0",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file [default: $UPDRAFT_CONFIG or platform-specific].
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// GitHub repository publishing releases (owner/repo).
    #[arg(long, global = true, value_name = "REPO", conflicts_with = "oci_artifact")]
    pub github_repo: Option<String>,

    /// OCI repository publishing releases (registry/repository).
    #[arg(long, global = true, value_name = "REF")]
    pub oci_artifact: Option<String>,

    /// Homebrew formula that may own the installed binary.
    #[arg(long, global = true, value_name = "FORMULA")]
    pub homebrew_formula: Option<String>,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Report whether a newer release exists.
    Check(CheckArgs),

    /// Download, verify and extract a release executable.
    Download(DownloadArgs),
}

/// Arguments for the check command.
#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Version of the installed tool.
    #[arg(long, value_name = "VERSION")]
    pub current_version: String,

    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the download command.
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Release tag to fetch [default: the latest release].
    #[arg(long = "release", value_name = "TAG")]
    pub release: Option<String>,

    /// Version of the installed tool; the download is skipped when no newer
    /// release exists.
    #[arg(long, value_name = "VERSION", conflicts_with = "release")]
    pub current_version: Option<String>,

    /// Name of the executable inside the release archive.
    #[arg(long, value_name = "NAME")]
    pub executable: String,

    /// Where to place the verified executable [default: print the temporary
    /// path].
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<Utf8PathBuf>,

    /// Proceed when the release publishes no checksum.
    #[arg(long)]
    pub allow_unverified: bool,

    /// Operating system token to select assets for [default: this host].
    #[arg(long, value_name = "OS", requires = "arch")]
    pub os: Option<String>,

    /// Architecture token to select assets for [default: this host].
    #[arg(long, value_name = "ARCH", requires = "os")]
    pub arch: Option<String>,
}

impl Cli {
    /// Overlay command-line flags on file configuration.
    ///
    /// A source flag replaces both source settings from the file so that
    /// `--oci-artifact` can override a configured `github_repo`.
    ///
    /// # Examples
    ///
    /// ```
    /// use clap::Parser;
    /// use updraft::cli::Cli;
    /// use updraft::config::UpdaterConfig;
    ///
    /// let file = UpdaterConfig {
    ///     github_repo: Some("octo-org/old".to_owned()),
    ///     ..UpdaterConfig::default()
    /// };
    /// let cli = Cli::parse_from([
    ///     "updraft", "--oci-artifact", "ghcr.io/octo-org/new",
    ///     "check", "--current-version", "1.0.0",
    /// ]);
    /// let merged = cli.apply_overrides(file);
    /// assert_eq!(merged.github_repo, None);
    /// assert_eq!(merged.oci_artifact.as_deref(), Some("ghcr.io/octo-org/new"));
    /// ```
    #[must_use]
    pub fn apply_overrides(&self, mut config: UpdaterConfig) -> UpdaterConfig {
        if self.github_repo.is_some() || self.oci_artifact.is_some() {
            config.github_repo.clone_from(&self.github_repo);
            config.oci_artifact.clone_from(&self.oci_artifact);
        }
        if let Some(formula) = &self.homebrew_formula {
            config.homebrew_formula = Some(formula.clone());
        }
        if let Some(timeout) = self.timeout {
            config.http_timeout_secs = timeout;
        }
        if let Command::Download(args) = &self.command {
            if args.allow_unverified {
                config.require_checksum = false;
            }
        }
        config
    }
}

impl DownloadArgs {
    /// The platform requested with `--os` and `--arch`, if any.
    #[must_use]
    pub fn platform(&self) -> Option<Platform> {
        match (&self.os, &self.arch) {
            (Some(os), Some(arch)) => Some(Platform::new(os, arch)),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
