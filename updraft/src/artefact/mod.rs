//! Release artefact download, checksum verification, and extraction.
//!
//! # Sub-modules
//!
//! - [`checksum`] - Companion checksum asset lookup.
//! - [`checksum_manifest`] - Checksum manifest parsing and retrieval.
//! - [`download`] - Download trait and HTTP implementation.
//! - [`extraction`] - Executable extraction from gzip-compressed tarballs.
//! - [`sha256_digest`] - SHA-256 digest newtype and hashing helpers.
//! - [`verification`] - Verification policy value types.

pub mod checksum;
pub mod checksum_manifest;
pub mod download;
pub mod extraction;
pub mod sha256_digest;
pub mod verification;
