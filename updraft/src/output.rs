//! Output formatting for the updraft CLI.
//!
//! Results go to stdout; progress and errors go to stderr. Writes are best
//! effort: a closed pipe must not turn a successful update into a failure.

use std::io::Write;

use crate::update_check::UpdateInfo;

/// Write `message` and a newline, ignoring write failures.
pub fn write_line(out: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(out, "{message}").is_err() {
        // Best-effort output; ignore write failures.
    }
}

/// Write a progress line to `stderr` unless `quiet` is set.
pub fn write_progress(stderr: &mut dyn Write, quiet: bool, message: impl std::fmt::Display) {
    if !quiet {
        write_line(stderr, message);
    }
}

/// Describe the outcome of an update check for a human reader.
///
/// # Example
///
/// ```
/// use updraft::output::update_summary;
///
/// assert_eq!(update_summary("1.2.0", None), "updraft: 1.2.0 is up to date");
/// ```
#[must_use]
pub fn update_summary(current_version: &str, info: Option<&UpdateInfo>) -> String {
    let Some(info) = info else {
        return format!("updraft: {current_version} is up to date");
    };

    let mut lines = vec![format!(
        "updraft: {} is available (current {current_version})",
        info.latest_version
    )];
    if let Some(released_at) = info.latest_release_at {
        lines.push(format!("  released {}", released_at.format("%Y-%m-%d")));
    }
    match &info.external_upgrade_command {
        Some(command) => lines.push(format!("  upgrade with: {command}")),
        None if info.can_upgrade_in_place => {
            lines.push("  run `updraft download` to fetch it".to_owned());
        }
        None => {}
    }
    lines.join("\n")
}

/// Hint printed after a failed update.
#[must_use]
pub fn manual_upgrade_hint() -> &'static str {
    "Automatic update failed; please download and install the latest release manually."
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use rstest::{fixture, rstest};

    #[fixture]
    fn info() -> UpdateInfo {
        UpdateInfo {
            latest_version: "v1.3.0".to_owned(),
            latest_release_at: Some(
                DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                    .expect("timestamp")
                    .with_timezone(&Utc),
            ),
            checked_at: None,
            can_upgrade_in_place: true,
            external_upgrade_command: None,
        }
    }

    #[rstest]
    fn summary_names_both_versions(info: UpdateInfo) {
        let summary = update_summary("1.2.0", Some(&info));
        assert!(summary.contains("v1.3.0 is available (current 1.2.0)"));
        assert!(summary.contains("released 2024-05-01"));
        assert!(summary.contains("updraft download"));
    }

    #[rstest]
    fn summary_prefers_package_manager_command(mut info: UpdateInfo) {
        info.can_upgrade_in_place = false;
        info.external_upgrade_command = Some("brew upgrade tool".to_owned());
        let summary = update_summary("1.2.0", Some(&info));
        assert!(summary.contains("upgrade with: brew upgrade tool"));
        assert!(!summary.contains("updraft download"));
    }

    #[rstest]
    #[case::loud(false, "working\n")]
    #[case::quiet(true, "")]
    fn progress_respects_quiet(#[case] quiet: bool, #[case] expected: &str) {
        let mut stderr = Vec::new();
        write_progress(&mut stderr, quiet, "working");
        assert_eq!(String::from_utf8(stderr).expect("utf-8"), expected);
    }
}
