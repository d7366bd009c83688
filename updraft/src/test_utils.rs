//! Shared test utilities for the updraft crate.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! behavioural test suite.

use crate::artefact::download::{ArtefactDownloader, DownloadError};
use crate::exec::{CommandExecutor, ExecError};
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};

/// Returns the lowercase hex SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// One entry to place in a test tarball.
#[derive(Debug, Clone)]
pub struct TarEntry {
    /// Path of the entry inside the archive.
    pub path: String,
    /// Permission bits recorded in the tar header.
    pub mode: u32,
    /// File contents; ignored for directories.
    pub contents: Vec<u8>,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

impl TarEntry {
    /// A regular file entry.
    #[must_use]
    pub fn file(path: &str, mode: u32, contents: &[u8]) -> Self {
        Self {
            path: path.to_owned(),
            mode,
            contents: contents.to_vec(),
            is_dir: false,
        }
    }

    /// A directory entry.
    #[must_use]
    pub fn dir(path: &str) -> Self {
        Self {
            path: path.to_owned(),
            mode: 0o755,
            contents: Vec::new(),
            is_dir: true,
        }
    }
}

/// Build an in-memory gzip-compressed tarball containing `entries`.
///
/// # Errors
///
/// Returns any I/O error raised by the tar or gzip encoders.
pub fn tar_gz_bytes(entries: &[TarEntry]) -> std::io::Result<Vec<u8>> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for entry in entries {
        let mut header = tar::Header::new_gnu();
        header.set_path(&entry.path)?;
        header.set_mode(entry.mode);
        if entry.is_dir {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_cksum();
            builder.append(&header, std::io::empty())?;
        } else {
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(entry.contents.len() as u64);
            header.set_cksum();
            builder.append(&header, entry.contents.as_slice())?;
        }
    }

    builder.into_inner()?.finish()
}

/// Write a gzip-compressed tarball containing `entries` to `path`.
///
/// # Errors
///
/// Returns any I/O error raised while encoding or writing.
pub fn write_tar_gz(path: &Path, entries: &[TarEntry]) -> std::io::Result<()> {
    let bytes = tar_gz_bytes(entries)?;
    let mut file = std::fs::File::create(path)?;
    file.write_all(&bytes)
}

/// A downloader that serves fixed bodies from memory, keyed by URL.
///
/// Unknown URLs produce [`DownloadError::NotFound`]. Every requested URL is
/// recorded so tests can assert on the request sequence, and every file
/// written by [`ArtefactDownloader::download_to`] so tests can check it was
/// cleaned up.
#[derive(Debug, Default)]
pub struct StubDownloader {
    bodies: HashMap<String, Vec<u8>>,
    requests: RefCell<Vec<String>>,
    destinations: RefCell<Vec<PathBuf>>,
}

impl StubDownloader {
    /// Creates an empty downloader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    #[must_use]
    pub fn with_body(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_owned(), body.into());
        self
    }

    /// URLs requested so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    /// Paths written by `download_to`, in order.
    #[must_use]
    pub fn destinations(&self) -> Vec<PathBuf> {
        self.destinations.borrow().clone()
    }

    fn body(&self, url: &str) -> Result<&[u8], DownloadError> {
        self.requests.borrow_mut().push(url.to_owned());
        self.bodies
            .get(url)
            .map(Vec::as_slice)
            .ok_or_else(|| DownloadError::NotFound {
                url: url.to_owned(),
            })
    }
}

impl ArtefactDownloader for StubDownloader {
    fn open(&self, url: &str) -> Result<Box<dyn Read>, DownloadError> {
        let body = self.body(url)?.to_vec();
        Ok(Box::new(Cursor::new(body)))
    }

    fn download_to(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let body = self.body(url)?;
        self.destinations.borrow_mut().push(dest.to_path_buf());
        std::fs::write(dest, body)?;
        Ok(body.len() as u64)
    }
}

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with the given stdout.
#[must_use]
pub fn success_output_with(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The program path the command is run with.
    pub program: &'static str,
    /// The arguments to pass to the command.
    pub args: Vec<&'static str>,
    /// The result to return when this command is invoked.
    pub result: Result<Output, ExecError>,
}

/// A stub implementation of [`CommandExecutor`] for testing.
///
/// Resolves every program to a fixed path (or to nothing) and returns
/// predefined results for the expected command invocations, in order.
#[derive(Debug)]
pub struct StubExecutor {
    located: Option<PathBuf>,
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given lookup result and expected
    /// calls.
    #[must_use]
    pub fn new(located: Option<PathBuf>, expected: Vec<ExpectedCall>) -> Self {
        Self {
            located,
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn locate(&self, _program: &str) -> Option<PathBuf> {
        self.located.clone()
    }

    fn run(&self, program: &Path, args: &[&str]) -> Result<Output, ExecError> {
        let mut expected = self.expected.borrow_mut();
        let call = expected.pop_front().expect("unexpected command invocation");

        assert_eq!(Path::new(call.program), program);
        assert_eq!(call.args.as_slice(), args);

        call.result
    }
}
