//! Platform directory lookup.
//!
//! Wraps `directories-next` behind [`BaseDirs`] so configuration discovery
//! can be tested without touching the real home directory.

use std::path::PathBuf;

/// Source of platform-specific base directories.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// Directory holding updraft's configuration, e.g.
    /// `~/.config/updraft` on Linux.
    fn updraft_config_dir(&self) -> Option<PathBuf>;
}

/// Base directories of the current user, as reported by the platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn updraft_config_dir(&self) -> Option<PathBuf> {
        directories_next::BaseDirs::new().map(|dirs| dirs.config_dir().join("updraft"))
    }
}
