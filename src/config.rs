//! Configuration loading via `ortho-config`.
//!
//! Two layers are exposed: [`SshConfig`] describes how to reach the node and
//! [`ProvisionSettings`] tunes the configure phase. Both merge defaults,
//! `clusterseed.toml` discovery, and environment variables.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::retry::{BoundedPoll, RetryPolicy};

/// SSH settings used by [`crate::remote::SshEndpoint`].
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "CLUSTERSEED_SSH",
    discovery(
        app_name = "clusterseed",
        env_var = "CLUSTERSEED_CONFIG_PATH",
        config_file_name = "clusterseed.toml",
        dotfile_name = ".clusterseed.toml",
        project_file_name = "clusterseed.toml"
    )
)]
pub struct SshConfig {
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Remote user to connect as.
    #[ortho_config(default = "core".to_owned())]
    pub user: String,
    /// TCP port of the node's SSH daemon.
    #[ortho_config(default = 22)]
    pub port: u16,
    /// Path to the SSH private key. Supports tilde expansion. When absent,
    /// `ssh` falls back to its default key locations.
    pub identity_file: Option<String>,
    /// Whether to force batch mode to avoid password prompts.
    #[ortho_config(default = true)]
    pub batch_mode: bool,
    /// Whether to enforce host key checking. Freshly booted nodes present
    /// unknown keys, so this defaults to off.
    #[ortho_config(default = false)]
    pub strict_host_key_checking: bool,
    /// Known hosts file override.
    #[ortho_config(default = "/dev/null".to_owned())]
    pub known_hosts_file: String,
    /// Connection timeout handed to `ssh` in seconds.
    #[ortho_config(default = 10)]
    pub connect_timeout_secs: u32,
}

impl SshConfig {
    /// Loads SSH configuration without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("clusterseed")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Ensures required values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_value(&self.ssh_bin, "CLUSTERSEED_SSH_SSH_BIN", "ssh_bin")?;
        require_value(&self.user, "CLUSTERSEED_SSH_USER", "user")?;
        if let Some(identity) = self.identity_file.as_deref() {
            require_value(identity, "CLUSTERSEED_SSH_IDENTITY_FILE", "identity_file")?;
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid(String::from(
                "port must be greater than zero",
            )));
        }
        Ok(())
    }
}

/// Tuning for the configure phase.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "CLUSTERSEED",
    discovery(
        app_name = "clusterseed",
        env_var = "CLUSTERSEED_CONFIG_PATH",
        config_file_name = "clusterseed.toml",
        dotfile_name = ".clusterseed.toml",
        project_file_name = "clusterseed.toml"
    )
)]
pub struct ProvisionSettings {
    /// Service bracketed by the configure phase.
    #[ortho_config(default = "kubelet".to_owned())]
    pub service_name: String,
    /// Delay between attempts while waiting for the cluster API.
    #[ortho_config(default = 1)]
    pub poll_interval_secs: u64,
    /// Deadline for each cluster API step.
    #[ortho_config(default = 80)]
    pub poll_timeout_secs: u64,
    /// Attempts allowed for workload cleanup.
    #[ortho_config(default = 2)]
    pub cleanup_attempts: u32,
    /// Delay between workload cleanup attempts.
    #[ortho_config(default = 2)]
    pub cleanup_delay_secs: u64,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            service_name: String::from("kubelet"),
            poll_interval_secs: 1,
            poll_timeout_secs: 80,
            cleanup_attempts: 2,
            cleanup_delay_secs: 2,
        }
    }
}

impl ProvisionSettings {
    /// Loads settings without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("clusterseed")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Rejects settings that would make the configure phase meaningless.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a blank service name or a zero
    /// interval, timeout, or attempt count.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_value(&self.service_name, "CLUSTERSEED_SERVICE_NAME", "service_name")?;
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(String::from(
                "poll_interval_secs must be greater than zero",
            )));
        }
        if self.poll_timeout_secs == 0 {
            return Err(ConfigError::Invalid(String::from(
                "poll_timeout_secs must be greater than zero",
            )));
        }
        if self.cleanup_attempts == 0 {
            return Err(ConfigError::Invalid(String::from(
                "cleanup_attempts must be greater than zero",
            )));
        }
        Ok(())
    }

    /// Polling pattern used for the secret replacement and cluster ID steps.
    #[must_use]
    pub const fn api_poll(&self) -> BoundedPoll {
        BoundedPoll::new(
            Duration::from_secs(self.poll_interval_secs),
            Duration::from_secs(self.poll_timeout_secs),
        )
    }

    /// Retry policy used for workload cleanup.
    #[must_use]
    pub const fn cleanup_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.cleanup_attempts,
            Duration::from_secs(self.cleanup_delay_secs),
        )
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// Indicates a value failed semantic validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

fn require_value(value: &str, env_var: &str, toml_key: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!(
            "missing {toml_key}: set {env_var} or add {toml_key} to clusterseed.toml"
        )));
    }
    Ok(())
}
