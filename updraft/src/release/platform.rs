//! Operating system and architecture tokens used to match release assets.
//!
//! Release tooling such as GoReleaser names artefacts with Go's `GOOS` and
//! `GOARCH` vocabulary (`darwin`, `amd64`, `arm64`). [`Platform::current`]
//! translates the Rust target constants into that vocabulary. Selection code
//! never calls it; the platform is always passed in explicitly.

use std::fmt;

/// A lowercase OS/architecture pair.
///
/// # Examples
///
/// ```
/// use updraft::release::platform::Platform;
///
/// let platform = Platform::new("Linux", "AMD64");
/// assert_eq!(platform.os(), "linux");
/// assert_eq!(platform.arch(), "amd64");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    os: String,
    arch: String,
}

impl Platform {
    /// Build a platform from raw tokens, lowercasing both.
    #[must_use]
    pub fn new(os: impl AsRef<str>, arch: impl AsRef<str>) -> Self {
        Self {
            os: os.as_ref().to_lowercase(),
            arch: arch.as_ref().to_lowercase(),
        }
    }

    /// The platform this binary was compiled for, in release-naming tokens.
    #[must_use]
    pub fn current() -> Self {
        Self::new(
            os_token(std::env::consts::OS),
            arch_token(std::env::consts::ARCH),
        )
    }

    /// The lowercase operating system token.
    #[must_use]
    pub fn os(&self) -> &str {
        &self.os
    }

    /// The lowercase architecture token.
    #[must_use]
    pub fn arch(&self) -> &str {
        &self.arch
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// Map a Rust `std::env::consts::OS` value to its release-naming token.
#[must_use]
pub fn os_token(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

/// Map a Rust `std::env::consts::ARCH` value to its release-naming token.
#[must_use]
pub fn arch_token(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "powerpc64" => "ppc64",
        other => other,
    }
}
