//! The updater facade.
//!
//! [`Updater`] ties a release source, the package managers that may own
//! the installed binary and the download pipeline together. Build one with
//! [`Updater::builder`] or from an [`UpdaterConfig`].

use chrono::Utc;

use crate::artefact::download::ArtefactDownloader;
use crate::artefact::extraction::{ExecutableExtractor, GzipTarExtractor};
use crate::artefact::verification::VerificationPolicy;
use crate::config::{ConfigError, UpdaterConfig};
use crate::error::Result;
use crate::package_manager::{self, ExternalPackageManager, HomebrewPackageManager};
use crate::pipeline::{self, DownloadOptions, ResolvedArtifact};
use crate::release::github::GitHubReleaseSource;
use crate::release::oci::OciReleaseSource;
use crate::release::asset::ReleaseAssetSet;
use crate::release::platform::Platform;
use crate::release::source::ReleaseSource;
use crate::update_check::{UpdateInfo, VersionInfo, update_info_from_versions};

/// Checks for and fetches new releases of the running program.
pub struct Updater {
    current_version: String,
    source: Box<dyn ReleaseSource>,
    package_managers: Vec<Box<dyn ExternalPackageManager>>,
    policy: VerificationPolicy,
    platform: Platform,
    executable_name: Option<String>,
}

impl std::fmt::Debug for Updater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Updater")
            .field("current_version", &self.current_version)
            .field("package_managers", &self.package_managers.len())
            .field("policy", &self.policy)
            .field("platform", &self.platform)
            .field("executable_name", &self.executable_name)
            .finish_non_exhaustive()
    }
}

impl Updater {
    /// Start building an updater for a program at `current_version`.
    #[must_use]
    pub fn builder(current_version: impl Into<String>) -> UpdaterBuilder {
        UpdaterBuilder::new(current_version)
    }

    /// Build an updater from configuration.
    ///
    /// # Errors
    ///
    /// See [`UpdaterBuilder::from_config`].
    pub fn from_config(current_version: impl Into<String>, config: &UpdaterConfig) -> Result<Self> {
        UpdaterBuilder::from_config(current_version, config)?.build()
    }

    /// The version of the running program.
    #[must_use]
    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// The platform assets are selected for.
    #[must_use]
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// The newest version the release source publishes.
    ///
    /// # Errors
    ///
    /// Returns an error when the source cannot be queried.
    pub fn latest_version(&self) -> Result<VersionInfo> {
        Ok(self.source.latest_version()?)
    }

    /// Describe the available upgrade, or `None` when the program is up to
    /// date.
    ///
    /// In-place upgrades are allowed only when no package manager owns the
    /// binary; otherwise the manager's upgrade command is reported.
    ///
    /// # Errors
    ///
    /// Returns an error when the source cannot be queried or either version
    /// is not a semantic version.
    pub fn get_update_info(&self) -> Result<Option<UpdateInfo>> {
        let checked_at = Utc::now();
        let latest = self.source.latest_version()?;
        log::debug!(
            "latest version {} (current {})",
            latest.version,
            self.current_version
        );

        let Some(mut info) = update_info_from_versions(&self.current_version, &latest)? else {
            return Ok(None);
        };

        info.external_upgrade_command = self.external_upgrade_command();
        info.can_upgrade_in_place = info.external_upgrade_command.is_none();
        info.checked_at = Some(checked_at);
        Ok(Some(info))
    }

    /// Whether the program may replace itself.
    ///
    /// # Errors
    ///
    /// Propagates the first package-manager detection error.
    pub fn can_support_upgrade(&self) -> Result<bool> {
        Ok(package_manager::can_support_upgrade(&self.package_managers)?)
    }

    /// The upgrade command of the package manager that owns the binary.
    #[must_use]
    pub fn external_upgrade_command(&self) -> Option<String> {
        package_manager::external_upgrade_command(&self.package_managers)
    }

    /// Download, verify and extract the executable published for `version`.
    ///
    /// The returned file belongs to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error when the release cannot be listed or any pipeline
    /// stage fails.
    pub fn download_version(&self, version: &str) -> Result<ResolvedArtifact> {
        let assets = self.list_release(version)?;
        // Sources may pick up credentials while listing; the downloader
        // must be built afterwards to reuse them.
        let downloader = self.source.downloader();
        self.download_listed(&assets, downloader.as_ref(), &GzipTarExtractor)
    }

    /// [`download_version`](Self::download_version) with injected
    /// downloader and extractor.
    ///
    /// # Errors
    ///
    /// Returns an error when the release cannot be listed or any pipeline
    /// stage fails.
    pub fn download_version_with(
        &self,
        version: &str,
        downloader: &dyn ArtefactDownloader,
        extractor: &dyn ExecutableExtractor,
    ) -> Result<ResolvedArtifact> {
        let assets = self.list_release(version)?;
        self.download_listed(&assets, downloader, extractor)
    }

    fn list_release(&self, version: &str) -> Result<ReleaseAssetSet> {
        let assets = self.source.list_assets(version)?;
        log::debug!("release {version} lists {} assets", assets.len());
        Ok(assets)
    }

    fn download_listed(
        &self,
        assets: &ReleaseAssetSet,
        downloader: &dyn ArtefactDownloader,
        extractor: &dyn ExecutableExtractor,
    ) -> Result<ResolvedArtifact> {
        let executable_name = match &self.executable_name {
            Some(name) => name.clone(),
            None => pipeline::current_executable_name()?,
        };
        let options = DownloadOptions {
            expected_executable: &executable_name,
            policy: self.policy,
        };

        Ok(pipeline::download_version_with(
            assets,
            &self.platform,
            &options,
            downloader,
            extractor,
        )?)
    }
}

/// Builder for [`Updater`].
pub struct UpdaterBuilder {
    current_version: String,
    source: Option<Box<dyn ReleaseSource>>,
    package_managers: Vec<Box<dyn ExternalPackageManager>>,
    policy: VerificationPolicy,
    platform: Option<Platform>,
    executable_name: Option<String>,
}

impl UpdaterBuilder {
    /// A builder with checksum verification required and the host platform.
    #[must_use]
    pub fn new(current_version: impl Into<String>) -> Self {
        Self {
            current_version: current_version.into(),
            source: None,
            package_managers: Vec::new(),
            policy: VerificationPolicy::default(),
            platform: None,
            executable_name: None,
        }
    }

    /// A builder populated from configuration: the configured release
    /// source, an optional Homebrew formula and the checksum policy.
    ///
    /// # Errors
    ///
    /// Returns an error when no release source, or more than one, is
    /// configured, or when the configured repository cannot be parsed.
    pub fn from_config(current_version: impl Into<String>, config: &UpdaterConfig) -> Result<Self> {
        let timeout = config.http_timeout();
        let source: Box<dyn ReleaseSource> = match (&config.github_repo, &config.oci_artifact) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingReleaseSources.into()),
            (Some(repo), None) => Box::new(GitHubReleaseSource::new(repo)?.with_timeout(timeout)),
            (None, Some(artifact)) => {
                Box::new(OciReleaseSource::new(artifact)?.with_timeout(timeout))
            }
            (None, None) => return Err(ConfigError::NoReleaseSource.into()),
        };

        let mut builder = Self::new(current_version)
            .release_source(source)
            .verification_policy(config.verification_policy());
        if let Some(formula) = &config.homebrew_formula {
            builder = builder.homebrew_formula(formula.clone());
        }
        Ok(builder)
    }

    /// Where releases are published.
    #[must_use]
    pub fn release_source(mut self, source: Box<dyn ReleaseSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Add a package manager that may own the installed binary.
    #[must_use]
    pub fn package_manager(mut self, manager: Box<dyn ExternalPackageManager>) -> Self {
        self.package_managers.push(manager);
        self
    }

    /// Check whether Homebrew installed `formula`.
    #[must_use]
    pub fn homebrew_formula(self, formula: impl Into<String>) -> Self {
        self.package_manager(Box::new(HomebrewPackageManager::new(formula)))
    }

    /// How to treat releases without a checksum.
    #[must_use]
    pub const fn verification_policy(mut self, policy: VerificationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Select assets for `platform` instead of the host.
    #[must_use]
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Extract `name` from archives instead of the running program's name.
    #[must_use]
    pub fn executable_name(mut self, name: impl Into<String>) -> Self {
        self.executable_name = Some(name.into());
        self
    }

    /// Finish building.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoReleaseSource`] when no source was set.
    pub fn build(self) -> Result<Updater> {
        let source = self.source.ok_or(ConfigError::NoReleaseSource)?;
        Ok(Updater {
            current_version: self.current_version,
            source,
            package_managers: self.package_managers,
            policy: self.policy,
            platform: self.platform.unwrap_or_else(Platform::current),
            executable_name: self.executable_name,
        })
    }
}

impl std::fmt::Debug for UpdaterBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdaterBuilder")
            .field("current_version", &self.current_version)
            .field("has_source", &self.source.is_some())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "updater_tests.rs"]
mod tests;
