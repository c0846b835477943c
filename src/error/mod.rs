//! Provisioning error taxonomy and error aggregation.

use std::fmt;
use std::time::Duration;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::command::CommandError;
use crate::remote::RemoteError;
use crate::retry::{PollError, RetryError};
use crate::service::ServiceAction;

/// Named step of a provisioning run, used to label failures.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Step {
    /// Writing the kubeconfig to the node.
    InstallKubeconfig,
    /// Writing the pull secret `Secret` manifest to the node.
    InstallPullSecretManifest,
    /// Replacing the cluster's placeholder pull secret.
    ReplacePullSecret,
    /// Assigning a fresh cluster identifier.
    PatchClusterId,
    /// Stopping and removing pod sandboxes.
    RemoveWorkloads,
    /// Writing the raw pull secret for the kubelet.
    PersistPullSecret,
}

impl Step {
    /// Returns a short human-readable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InstallKubeconfig => "install kubeconfig",
            Self::InstallPullSecretManifest => "install pull secret manifest",
            Self::ReplacePullSecret => "replace pull secret",
            Self::PatchClusterId => "patch cluster ID",
            Self::RemoveWorkloads => "remove workloads",
            Self::PersistPullSecret => "persist pull secret",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Errors raised while provisioning a node.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// Raised when a local input file cannot be read.
    #[error("failed to read {path}: {message}")]
    LocalInput {
        /// Path that was requested.
        path: Utf8PathBuf,
        /// Underlying I/O error description.
        message: String,
    },
    /// Raised when a payload cannot be embedded in a remote command.
    #[error("{step} failed: {source}")]
    Payload {
        /// Step that rendered the payload.
        step: Step,
        /// Rendering failure.
        #[source]
        source: CommandError,
    },
    /// Raised when a remote command fails outside a retry loop, or after the
    /// final retry.
    #[error("{step} failed: {source}")]
    CommandFailed {
        /// Step that issued the command.
        step: Step,
        /// Remote failure.
        #[source]
        source: RemoteError,
    },
    /// Raised when the service manager rejects a lifecycle request.
    #[error("failed to {action} service {service}: {source}")]
    Service {
        /// Requested lifecycle action.
        action: ServiceAction,
        /// Service name.
        service: String,
        /// Remote failure.
        #[source]
        source: RemoteError,
    },
    /// Raised when a bounded poll exhausts its deadline.
    #[error("{step} timed out after {}s: {last_error}", .timeout.as_secs())]
    Timeout {
        /// Step that was polled.
        step: Step,
        /// Deadline that elapsed.
        timeout: Duration,
        /// Failure reported by the final attempt.
        #[source]
        last_error: RemoteError,
    },
    /// Raised when the caller cancels while a step is waiting.
    #[error("{step} cancelled")]
    Cancelled {
        /// Step that was interrupted.
        step: Step,
    },
    /// Ordered failures collected while configuring the cluster.
    #[error("{}", render_aggregate(.0))]
    Aggregate(Vec<ProvisionError>),
}

impl ProvisionError {
    /// Converts the outcome of a bounded poll for `step`.
    #[must_use]
    pub fn from_poll(step: Step, timeout: Duration, err: PollError<RemoteError>) -> Self {
        match err {
            PollError::TimedOut { last } => Self::Timeout {
                step,
                timeout,
                last_error: last,
            },
            PollError::Cancelled => Self::Cancelled { step },
        }
    }

    /// Converts the outcome of a retry loop for `step`.
    #[must_use]
    pub fn from_retry(step: Step, err: RetryError<RemoteError>) -> Self {
        match err {
            RetryError::Failed(source) => Self::CommandFailed { step, source },
            RetryError::Cancelled => Self::Cancelled { step },
        }
    }

    /// Returns the individual failures: the members of an aggregate, or the
    /// error itself.
    #[must_use]
    pub fn causes(&self) -> &[Self] {
        match self {
            Self::Aggregate(causes) => causes,
            other => std::slice::from_ref(other),
        }
    }
}

fn render_aggregate(causes: &[ProvisionError]) -> String {
    let listed = causes
        .iter()
        .enumerate()
        .map(|(index, cause)| format!("{}) {cause}", index + 1))
        .collect::<Vec<_>>()
        .join("; ");
    format!("{} error(s) occurred: {listed}", causes.len())
}

/// Accumulates independent failures in the order they occur.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<ProvisionError>,
}

impl ErrorCollector {
    /// Creates an empty collector.
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Records `err`.
    pub fn collect(&mut self, err: ProvisionError) {
        self.errors.push(err);
    }

    /// Records the error of `result`, if any, and returns its value.
    pub fn record<T>(&mut self, result: Result<T, ProvisionError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.collect(err);
                None
            }
        }
    }

    /// Number of collected errors.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether no errors were collected.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Collapses the collected errors.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Aggregate`] holding every collected error
    /// when at least one was recorded.
    pub fn finish(self) -> Result<(), ProvisionError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ProvisionError::Aggregate(self.errors))
        }
    }
}
