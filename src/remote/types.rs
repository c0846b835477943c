//! Process runner abstraction and remote command error types.

use std::ffi::OsString;
use std::process::Command;

use thiserror::Error;

/// Result of running a local process (for example the `ssh` client).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Abstraction over process execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `program` with the given arguments, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Spawn`] if the process cannot be started.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, RemoteError>;
}

/// Real command runner that shells out to the host operating system.
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, RemoteError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| RemoteError::Spawn {
                program: program.to_owned(),
                message: err.to_string(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Errors surfaced by a single remote command.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RemoteError {
    /// Raised when the transport process cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the remote command exits with a non-zero status.
    #[error("remote command exited with status {status}: {stderr}")]
    CommandFailure {
        /// Exit status reported by the transport.
        status: i32,
        /// Stderr captured from the command, trimmed.
        stderr: String,
    },
    /// Raised when the transport terminates without an exit status, for
    /// example when killed by a signal.
    #[error("remote command terminated without an exit status")]
    MissingExitCode,
}

impl RemoteError {
    /// Builds the error for a command that exited with `status`.
    #[must_use]
    pub fn failure(status: i32, stderr: &str) -> Self {
        Self::CommandFailure {
            status,
            stderr: stderr.trim().to_owned(),
        }
    }
}
