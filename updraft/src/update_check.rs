//! Version comparison between the running program and the latest release.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Errors arising from version comparison.
#[derive(Debug, thiserror::Error)]
pub enum UpdateCheckError {
    /// The latest release tag is not a semantic version.
    #[error("latest semver \"{value}\": {source}")]
    LatestVersion {
        /// The rejected tag.
        value: String,
        /// The parse failure.
        #[source]
        source: semver::Error,
    },

    /// The running program's version is not a semantic version.
    #[error("current semver \"{value}\": {source}")]
    CurrentVersion {
        /// The rejected version string.
        value: String,
        /// The parse failure.
        #[source]
        source: semver::Error,
    },
}

/// A published version as reported by a release source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    /// The release tag, e.g. `v1.4.0`.
    pub version: String,
    /// When the release was published, if the source knows.
    pub released_at: Option<DateTime<Utc>>,
}

/// Information about an available upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    /// The newer release tag.
    pub latest_version: String,
    /// When the newer release was published.
    pub latest_release_at: Option<DateTime<Utc>>,
    /// When the check ran.
    pub checked_at: Option<DateTime<Utc>>,
    /// Whether the program may replace itself.
    pub can_upgrade_in_place: bool,
    /// The package-manager command to run instead, when one owns the binary.
    pub external_upgrade_command: Option<String>,
}

/// Compare `current` against `latest` and describe the upgrade, if any.
///
/// Returns `Ok(None)` when `latest` is not newer than `current`. The
/// returned [`UpdateInfo`] allows in-place upgrades and carries no check
/// timestamp; the caller fills those in.
///
/// # Errors
///
/// Returns an error when either version is not a semantic version.
///
/// # Examples
///
/// ```
/// use updraft::update_check::{VersionInfo, update_info_from_versions};
///
/// let latest = VersionInfo { version: "v1.3.0".to_owned(), released_at: None };
/// let info = update_info_from_versions("1.2.9", &latest).unwrap();
/// assert_eq!(info.map(|i| i.latest_version), Some("v1.3.0".to_owned()));
/// assert!(update_info_from_versions("v1.3.0", &latest).unwrap().is_none());
/// ```
pub fn update_info_from_versions(
    current: &str,
    latest: &VersionInfo,
) -> Result<Option<UpdateInfo>, UpdateCheckError> {
    let latest_semver =
        parse_version(&latest.version).map_err(|source| UpdateCheckError::LatestVersion {
            value: latest.version.clone(),
            source,
        })?;
    let current_semver =
        parse_version(current).map_err(|source| UpdateCheckError::CurrentVersion {
            value: current.to_owned(),
            source,
        })?;

    if latest_semver <= current_semver {
        return Ok(None);
    }

    Ok(Some(UpdateInfo {
        latest_version: latest.version.clone(),
        latest_release_at: latest.released_at,
        checked_at: None,
        can_upgrade_in_place: true,
        external_upgrade_command: None,
    }))
}

/// Parse a release tag as a semantic version.
///
/// A leading `v` is ignored and missing minor or patch components are
/// treated as zero, so `v2` and `2.1` parse as `2.0.0` and `2.1.0`.
///
/// # Errors
///
/// Returns the `semver` error for anything else that is not a version.
///
/// # Examples
///
/// ```
/// use updraft::update_check::parse_version;
///
/// assert_eq!(parse_version("v2.1").unwrap(), semver::Version::new(2, 1, 0));
/// assert!(parse_version("latest").is_err());
/// ```
pub fn parse_version(raw: &str) -> Result<semver::Version, semver::Error> {
    let trimmed = raw.trim();
    let unprefixed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    semver::Version::parse(unprefixed).or_else(|err| {
        let core_end = unprefixed
            .find(['-', '+'])
            .unwrap_or(unprefixed.len());
        let (core, rest) = unprefixed.split_at(core_end);
        match core.split('.').count() {
            1 => semver::Version::parse(&format!("{core}.0.0{rest}")),
            2 => semver::Version::parse(&format!("{core}.0{rest}")),
            _ => Err(err),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn latest(version: &str) -> VersionInfo {
        VersionInfo {
            version: version.to_owned(),
            released_at: None,
        }
    }

    #[rstest]
    #[case::newer_patch("1.2.3", "1.2.4", true)]
    #[case::newer_major("1.2.3", "v2.0.0", true)]
    #[case::equal("1.2.3", "v1.2.3", false)]
    #[case::older("1.2.3", "1.2.2", false)]
    #[case::prerelease_of_current("1.2.3", "1.2.3-rc.1", false)]
    #[case::release_after_prerelease("1.2.3-rc.1", "1.2.3", true)]
    fn compares_versions(#[case] current: &str, #[case] newest: &str, #[case] expected: bool) {
        let info = update_info_from_versions(current, &latest(newest)).expect("valid versions");
        assert_eq!(info.is_some(), expected);
    }

    #[test]
    fn update_info_carries_latest_release_details() {
        let released_at = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .expect("timestamp")
            .with_timezone(&Utc);
        let newest = VersionInfo {
            version: "v1.3.0".to_owned(),
            released_at: Some(released_at),
        };
        let info = update_info_from_versions("1.2.0", &newest)
            .expect("valid versions")
            .expect("update available");
        assert_eq!(info.latest_version, "v1.3.0");
        assert_eq!(info.latest_release_at, Some(released_at));
        assert!(info.can_upgrade_in_place);
    }

    #[test]
    fn invalid_latest_version_is_reported() {
        let err = update_info_from_versions("1.0.0", &latest("nightly")).expect_err("invalid");
        assert!(matches!(err, UpdateCheckError::LatestVersion { .. }));
    }

    #[test]
    fn invalid_current_version_is_reported() {
        let err = update_info_from_versions("dev", &latest("1.0.0")).expect_err("invalid");
        assert!(matches!(err, UpdateCheckError::CurrentVersion { .. }));
    }

    #[rstest]
    #[case::full("1.2.3", (1, 2, 3))]
    #[case::prefixed("v1.2.3", (1, 2, 3))]
    #[case::major_only("v2", (2, 0, 0))]
    #[case::major_minor("2.1", (2, 1, 0))]
    #[case::whitespace(" 1.0.0\n", (1, 0, 0))]
    fn parses_loose_versions(#[case] raw: &str, #[case] expected: (u64, u64, u64)) {
        let (major, minor, patch) = expected;
        assert_eq!(
            parse_version(raw).expect("version"),
            semver::Version::new(major, minor, patch)
        );
    }

    #[test]
    fn short_prerelease_versions_are_padded() {
        let version = parse_version("1.2-beta.1").expect("version");
        assert_eq!(version.to_string(), "1.2.0-beta.1");
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let info = UpdateInfo {
            latest_version: "v1.0.0".to_owned(),
            latest_release_at: None,
            checked_at: None,
            can_upgrade_in_place: false,
            external_upgrade_command: Some("brew upgrade myapp".to_owned()),
        };
        let json = serde_json::to_value(&info).expect("serialize");
        assert_eq!(json["latestVersion"], "v1.0.0");
        assert_eq!(json["canUpgradeInPlace"], false);
        assert_eq!(json["externalUpgradeCommand"], "brew upgrade myapp");
    }
}
