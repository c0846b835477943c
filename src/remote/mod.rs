//! Remote command channel to the node being provisioned.
//!
//! [`RemoteEndpoint`] is the seam the rest of the crate talks to. The
//! production implementation, [`SshEndpoint`], shells out to the system `ssh`
//! client through a [`CommandRunner`] so tests can substitute scripted output.

use std::ffi::OsString;

use tracing::debug;

use crate::config::SshConfig;
use crate::service::ServiceController;

mod types;
mod util;

pub use types::{CommandOutput, CommandRunner, ProcessCommandRunner, RemoteError};
pub use util::expand_tilde;

/// Executes command strings on a remote host.
pub trait RemoteEndpoint {
    /// Runs `command` on the host and returns its captured stdout.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the transport fails or the command exits
    /// unsuccessfully.
    fn run(&self, command: &str) -> Result<String, RemoteError>;
}

impl<E: RemoteEndpoint + ?Sized> RemoteEndpoint for &E {
    fn run(&self, command: &str) -> Result<String, RemoteError> {
        (**self).run(command)
    }
}

/// Handle to a provisionable machine: a command channel plus a service
/// manager, both borrowed for the duration of one provisioning call.
#[derive(Clone, Debug)]
pub struct RemoteHost<E, S> {
    endpoint: E,
    services: S,
}

impl<E, S> RemoteHost<E, S>
where
    E: RemoteEndpoint,
    S: ServiceController,
{
    /// Pairs a command channel with a service manager.
    #[must_use]
    pub const fn new(endpoint: E, services: S) -> Self {
        Self { endpoint, services }
    }

    /// Returns the command channel.
    #[must_use]
    pub const fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Returns the service manager.
    #[must_use]
    pub const fn services(&self) -> &S {
        &self.services
    }
}

/// [`RemoteEndpoint`] backed by the system `ssh` client.
#[derive(Clone, Debug)]
pub struct SshEndpoint<R: CommandRunner> {
    config: SshConfig,
    host: String,
    runner: R,
}

impl SshEndpoint<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    ///
    /// # Errors
    ///
    /// Returns [`crate::config::ConfigError`] when validation fails.
    pub fn with_process_runner(
        config: SshConfig,
        host: impl Into<String>,
    ) -> Result<Self, crate::config::ConfigError> {
        Self::new(config, host, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> SshEndpoint<R> {
    /// Creates an endpoint for `host` using the provided runner.
    ///
    /// # Errors
    ///
    /// Returns [`crate::config::ConfigError`] when the configuration or the
    /// host name is invalid.
    pub fn new(
        config: SshConfig,
        host: impl Into<String>,
        runner: R,
    ) -> Result<Self, crate::config::ConfigError> {
        config.validate()?;
        let trimmed_host = host.into().trim().to_owned();
        if trimmed_host.is_empty() {
            return Err(crate::config::ConfigError::Invalid(String::from(
                "remote host must not be empty",
            )));
        }
        Ok(Self {
            config,
            host: trimmed_host,
            runner,
        })
    }

    /// Returns the configured target host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    fn build_ssh_args(&self, command: &str) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-p"),
            OsString::from(self.config.port.to_string()),
        ];

        if let Some(ref identity_file) = self.config.identity_file {
            args.push(OsString::from("-i"));
            args.push(OsString::from(expand_tilde(identity_file)));
        }

        if self.config.batch_mode {
            args.push(OsString::from("-o"));
            args.push(OsString::from("BatchMode=yes"));
        }

        if !self.config.strict_host_key_checking {
            args.push(OsString::from("-o"));
            args.push(OsString::from("StrictHostKeyChecking=no"));
        }

        if !self.config.known_hosts_file.trim().is_empty() {
            args.push(OsString::from("-o"));
            args.push(OsString::from(format!(
                "UserKnownHostsFile={}",
                self.config.known_hosts_file
            )));
        }

        args.push(OsString::from("-o"));
        args.push(OsString::from(format!(
            "ConnectTimeout={}",
            self.config.connect_timeout_secs
        )));
        args.push(OsString::from("-o"));
        args.push(OsString::from("ServerAliveInterval=15"));

        args.push(OsString::from(format!("{}@{}", self.config.user, self.host)));
        args.push(OsString::from(command));
        args
    }
}

impl<R: CommandRunner> RemoteEndpoint for SshEndpoint<R> {
    fn run(&self, command: &str) -> Result<String, RemoteError> {
        let args = self.build_ssh_args(command);
        let output = self.runner.run(&self.config.ssh_bin, &args)?;
        debug!(host = %self.host, code = ?output.code, stdout = %output.stdout.trim(), "remote command finished");

        if output.is_success() {
            return Ok(output.stdout);
        }
        match output.code {
            Some(status) => Err(RemoteError::failure(status, &output.stderr)),
            None => Err(RemoteError::MissingExitCode),
        }
    }
}
