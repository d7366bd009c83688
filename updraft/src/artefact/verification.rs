//! Verification policy for downloaded release artefacts.
//!
//! The policy is a value type: it captures what the pipeline must do when a
//! release does or does not publish a checksum, without performing I/O
//! itself.

use std::fmt;

/// Policy governing how a downloaded artefact is verified before use.
///
/// A published checksum is always checked. The policy only decides what
/// happens when the release publishes none: with `require_checksum` set
/// (the default) the download is rejected, otherwise it proceeds
/// unverified.
///
/// # Examples
///
/// ```
/// use updraft::artefact::verification::{MissingChecksumAction, VerificationPolicy};
///
/// let policy = VerificationPolicy::default();
/// assert!(policy.require_checksum());
/// assert_eq!(policy.on_missing_checksum(), MissingChecksumAction::Reject);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationPolicy {
    require_checksum: bool,
}

impl VerificationPolicy {
    /// Build a policy with an explicit checksum requirement.
    #[must_use]
    pub const fn new(require_checksum: bool) -> Self {
        Self { require_checksum }
    }

    /// Return whether a published checksum is mandatory.
    #[must_use]
    pub const fn require_checksum(&self) -> bool {
        self.require_checksum
    }

    /// The action to take when the release has no checksum asset.
    #[must_use]
    pub const fn on_missing_checksum(&self) -> MissingChecksumAction {
        if self.require_checksum {
            MissingChecksumAction::Reject
        } else {
            MissingChecksumAction::ProceedUnverified
        }
    }
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self::new(true)
    }
}

impl fmt::Display for VerificationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.require_checksum {
            write!(f, "checksum verification required")
        } else {
            write!(f, "checksum verification optional")
        }
    }
}

/// What to do when a release publishes no checksum for the chosen asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissingChecksumAction {
    /// Fail the download.
    Reject,
    /// Continue with a warning.
    ProceedUnverified,
}

impl fmt::Display for MissingChecksumAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reject => write!(f, "reject unverified download"),
            Self::ProceedUnverified => write!(f, "proceed without verification"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_requires_checksum() {
        assert!(VerificationPolicy::default().require_checksum());
    }

    #[test]
    fn optional_policy_proceeds_unverified() {
        let policy = VerificationPolicy::new(false);
        assert_eq!(
            policy.on_missing_checksum(),
            MissingChecksumAction::ProceedUnverified
        );
    }

    #[test]
    fn policy_display() {
        assert_eq!(
            VerificationPolicy::default().to_string(),
            "checksum verification required"
        );
        assert_eq!(
            VerificationPolicy::new(false).to_string(),
            "checksum verification optional"
        );
    }

    #[test]
    fn missing_checksum_action_display() {
        assert_eq!(
            MissingChecksumAction::Reject.to_string(),
            "reject unverified download"
        );
    }
}
