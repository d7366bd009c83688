//! External command execution.
//!
//! Package-manager detection shells out to tools such as `brew`. This module
//! hides process spawning behind [`CommandExecutor`] so detection logic can
//! be tested with scripted responses, and bounds every command with a
//! timeout so a wedged package manager cannot hang an update check.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Default timeout for external commands.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors arising from running external commands.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The process could not be spawned or its output collected.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// The program that was run.
        program: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The process did not finish in time and was killed.
    #[error("{program} timed out after {seconds} seconds")]
    Timeout {
        /// The program that was run.
        program: String,
        /// The timeout that elapsed.
        seconds: u64,
    },
}

/// Abstraction for locating and running external commands.
pub trait CommandExecutor {
    /// Resolve `program` to an executable path, as a shell would via `PATH`.
    ///
    /// Returns `None` when the program is not installed.
    fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Runs a command with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] if the command cannot be spawned or times out.
    fn run(&self, program: &Path, args: &[&str]) -> Result<Output, ExecError>;
}

/// Executes commands on the host system.
///
/// # Examples
///
/// ```no_run
/// use updraft::exec::{CommandExecutor, SystemCommandExecutor};
///
/// let executor = SystemCommandExecutor::default();
/// if let Some(brew) = executor.locate("brew") {
///     let output = executor.run(&brew, &["--version"])?;
///     assert!(output.status.success());
/// }
/// # Ok::<(), updraft::exec::ExecError>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SystemCommandExecutor {
    timeout: Duration,
}

impl SystemCommandExecutor {
    /// Build an executor that kills commands running longer than `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemCommandExecutor {
    fn default() -> Self {
        Self::new(COMMAND_TIMEOUT)
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        find_in_path(program, std::env::var_os("PATH")?.as_os_str())
    }

    fn run(&self, program: &Path, args: &[&str]) -> Result<Output, ExecError> {
        let name = program.display().to_string();
        let spawn_error = |source| ExecError::Spawn {
            program: name.clone(),
            source,
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        // Drain both pipes while waiting; a child blocked on a full pipe
        // would otherwise never exit.
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        match child.wait_timeout(self.timeout).map_err(spawn_error)? {
            Some(status) => Ok(Output {
                status,
                stdout: join_reader(stdout).map_err(spawn_error)?,
                stderr: join_reader(stderr).map_err(spawn_error)?,
            }),
            None => {
                if let Err(err) = child.kill().and_then(|()| child.wait().map(drop)) {
                    log::warn!("failed to reap timed out {name}: {err}");
                }
                // Grandchildren may still hold the pipes open, so the
                // readers are left to finish on their own.
                Err(ExecError::Timeout {
                    program: name.clone(),
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }
}

type PipeReader = JoinHandle<std::io::Result<Vec<u8>>>;

fn spawn_reader(mut pipe: impl Read + Send + 'static) -> PipeReader {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join_reader(reader: Option<PipeReader>) -> std::io::Result<Vec<u8>> {
    match reader {
        Some(handle) => handle
            .join()
            .unwrap_or_else(|_| Err(std::io::Error::other("output reader panicked"))),
        None => Ok(Vec::new()),
    }
}

/// Search each directory of a `PATH`-style list for an executable `program`.
///
/// # Examples
///
/// ```
/// use std::ffi::OsStr;
/// use updraft::exec::find_in_path;
///
/// assert!(find_in_path("definitely-not-installed", OsStr::new("")).is_none());
/// ```
#[must_use]
pub fn find_in_path(program: &str, path_var: &std::ffi::OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .flat_map(|dir| candidate_names(program).map(move |name| dir.join(name)))
        .find(|candidate| is_executable_file(candidate))
}

#[cfg(windows)]
fn candidate_names(program: &str) -> impl Iterator<Item = String> + '_ {
    ["", ".exe", ".cmd", ".bat"]
        .into_iter()
        .map(move |ext| format!("{program}{ext}"))
}

#[cfg(not(windows))]
fn candidate_names(program: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(program.to_owned())
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_error_names_program() {
        let err = ExecError::Timeout {
            program: "brew".to_owned(),
            seconds: 30,
        };
        let msg = err.to_string();
        assert!(msg.contains("brew"));
        assert!(msg.contains("30"));
    }

    #[test]
    fn find_in_path_returns_none_for_empty_path() {
        assert!(find_in_path("brew", std::ffi::OsStr::new("")).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn find_in_path_requires_execute_bit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("temp dir");
        let tool = dir.path().join("brew");
        std::fs::write(&tool, b"#!/bin/sh\n").expect("write tool");
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o644)).expect("chmod");

        let path_var = std::env::join_paths([dir.path()]).expect("join");
        assert!(find_in_path("brew", &path_var).is_none());

        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        assert_eq!(find_in_path("brew", &path_var), Some(tool));
    }

    #[cfg(unix)]
    #[test]
    fn locate_honours_path_environment() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("temp dir");
        let tool = dir.path().join("updraft-fake-tool");
        std::fs::write(&tool, b"#!/bin/sh\n").expect("write tool");
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).expect("chmod");

        let path_var = std::env::join_paths([dir.path()]).expect("join");
        temp_env::with_var("PATH", Some(&path_var), || {
            let executor = SystemCommandExecutor::default();
            assert_eq!(executor.locate("updraft-fake-tool"), Some(tool.clone()));
        });
    }

    #[cfg(unix)]
    #[test]
    fn run_captures_output() {
        let executor = SystemCommandExecutor::default();
        let output = executor
            .run(Path::new("/bin/sh"), &["-c", "printf hello"])
            .expect("run");
        assert!(output.status.success());
        assert_eq!(output.stdout, b"hello");
    }

    #[cfg(unix)]
    #[test]
    fn run_collects_output_larger_than_pipe_buffer() {
        let executor = SystemCommandExecutor::new(Duration::from_secs(10));
        let output = executor
            .run(
                Path::new("/bin/sh"),
                &["-c", "head -c 200000 /dev/zero | tr '\\0' a"],
            )
            .expect("run");
        assert!(output.status.success());
        assert_eq!(output.stdout.len(), 200_000);
        assert!(output.stdout.iter().all(|byte| *byte == b'a'));
    }

    #[cfg(unix)]
    #[test]
    fn run_kills_commands_that_time_out() {
        let executor = SystemCommandExecutor::new(Duration::from_millis(100));
        let result = executor.run(Path::new("/bin/sh"), &["-c", "sleep 5"]);
        assert!(matches!(result, Err(ExecError::Timeout { .. })));
    }
}
