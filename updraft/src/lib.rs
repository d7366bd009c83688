//! Self-update support for command-line tools.
//!
//! This crate checks whether a newer release of a program exists, picks the
//! release asset built for the current platform, downloads it, verifies it
//! against a published SHA-256 checksum and extracts the executable. The
//! caller receives the path of the verified executable and performs the
//! final swap itself. It is used by the `updraft` CLI binary and can be
//! embedded in any tool that wants to update itself.
//!
//! # Modules
//!
//! - [`artefact`] - Download, checksum and archive handling
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Configuration file discovery and parsing
//! - [`dirs`] - Directory resolution abstraction for platform-specific paths
//! - [`error`] - Top-level error type for the facade and CLI
//! - [`exec`] - External command execution with timeouts
//! - [`output`] - Output formatting for the CLI
//! - [`package_manager`] - Detection of package managers that own the binary
//! - [`pipeline`] - Select, download, verify and extract orchestration
//! - [`release`] - Release assets, platform matching and release sources
//! - [`update_check`] - Semantic-version comparison
//! - [`updater`] - The facade tying sources, package managers and pipeline

pub mod artefact;
pub mod cli;
pub mod config;
pub mod dirs;
pub mod error;
pub mod exec;
pub mod output;
pub mod package_manager;
pub mod pipeline;
pub mod release;
pub mod update_check;
pub mod updater;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
