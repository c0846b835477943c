//! Cluster configuration bracket.
//!
//! [`ClusterConfigurer`] walks a fixed sequence of states: start the
//! service, replace the pull secret, assign a cluster identifier, then clean
//! up. Every state runs regardless of earlier failures; failures are collected
//! and returned together once the cleanup state has finished. Cleanup ignores
//! cancellation so the node is never left with the service running and stale
//! pods in place.

use std::fmt;

use camino::Utf8Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::command::RemoteCommand;
use crate::config::ProvisionSettings;
use crate::error::{ErrorCollector, ProvisionError, Step};
use crate::install::{KUBECONFIG_PATH, PULL_SECRET_MANIFEST_PATH};
use crate::remote::{RemoteEndpoint, RemoteHost};
use crate::retry::Attempt;
use crate::secret::ClusterIdSource;
use crate::service::{ServiceAction, ServiceController};

/// States of the configure bracket, in execution order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigureState {
    /// Nothing has run yet.
    Idle,
    /// Requesting the service start.
    ServiceStarting,
    /// Polling the pull secret replacement.
    SecretReplacing,
    /// Polling the cluster identifier patch.
    ClusterIdPatching,
    /// Stopping the service and removing workloads.
    CleaningUp,
    /// Terminal state.
    Done,
}

impl ConfigureState {
    /// Returns the state that follows `self`. [`Self::Done`] is absorbing.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Idle => Self::ServiceStarting,
            Self::ServiceStarting => Self::SecretReplacing,
            Self::SecretReplacing => Self::ClusterIdPatching,
            Self::ClusterIdPatching => Self::CleaningUp,
            Self::CleaningUp | Self::Done => Self::Done,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ServiceStarting => "starting service",
            Self::SecretReplacing => "replacing pull secret",
            Self::ClusterIdPatching => "patching cluster ID",
            Self::CleaningUp => "cleaning up",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ConfigureState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Runs the configure bracket against one host.
#[derive(Debug)]
pub struct ClusterConfigurer<'a, E, S, I> {
    host: &'a RemoteHost<E, S>,
    ids: &'a I,
    settings: &'a ProvisionSettings,
}

impl<'a, E, S, I> ClusterConfigurer<'a, E, S, I>
where
    E: RemoteEndpoint,
    S: ServiceController,
    I: ClusterIdSource,
{
    /// Creates a configurer for `host` drawing identifiers from `ids`.
    #[must_use]
    pub const fn new(
        host: &'a RemoteHost<E, S>,
        ids: &'a I,
        settings: &'a ProvisionSettings,
    ) -> Self {
        Self {
            host,
            ids,
            settings,
        }
    }

    /// Drives every state to [`ConfigureState::Done`].
    ///
    /// `cancel` interrupts the polling states only; cleanup always runs to
    /// completion.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Aggregate`] listing every failure in the
    /// order it occurred.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<(), ProvisionError> {
        let mut errors = ErrorCollector::new();
        let mut state = ConfigureState::Idle;

        loop {
            state = state.next();
            info!(%state, "configure state entered");
            match state {
                ConfigureState::Idle | ConfigureState::Done => break,
                ConfigureState::ServiceStarting => {
                    note(&mut errors, self.start_service());
                }
                ConfigureState::SecretReplacing => {
                    note(&mut errors, self.replace_pull_secret(cancel).await);
                }
                ConfigureState::ClusterIdPatching => {
                    note(&mut errors, self.patch_cluster_id(cancel).await);
                }
                ConfigureState::CleaningUp => {
                    note(&mut errors, self.stop_service());
                    note(&mut errors, self.remove_workloads().await);
                }
            }
        }

        errors.finish()
    }

    fn start_service(&self) -> Result<(), ProvisionError> {
        let service = self.settings.service_name.as_str();
        self.host
            .services()
            .start(service)
            .map_err(|source| ProvisionError::Service {
                action: ServiceAction::Start,
                service: service.to_owned(),
                source,
            })
    }

    fn stop_service(&self) -> Result<(), ProvisionError> {
        let service = self.settings.service_name.as_str();
        self.host
            .services()
            .stop(service)
            .map_err(|source| ProvisionError::Service {
                action: ServiceAction::Stop,
                service: service.to_owned(),
                source,
            })
    }

    async fn replace_pull_secret(&self, cancel: &CancellationToken) -> Result<(), ProvisionError> {
        let command = RemoteCommand::ReplacePullSecret {
            kubeconfig: Utf8Path::new(KUBECONFIG_PATH),
            manifest: Utf8Path::new(PULL_SECRET_MANIFEST_PATH),
        }
        .render();
        self.poll(Step::ReplacePullSecret, &command, cancel).await
    }

    async fn patch_cluster_id(&self, cancel: &CancellationToken) -> Result<(), ProvisionError> {
        let cluster_id = self.ids.next_id();
        info!(%cluster_id, "assigning cluster ID");
        let command = RemoteCommand::PatchClusterId {
            kubeconfig: Utf8Path::new(KUBECONFIG_PATH),
            cluster_id: &cluster_id,
        }
        .render();
        self.poll(Step::PatchClusterId, &command, cancel).await
    }

    async fn poll(
        &self,
        step: Step,
        command: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ProvisionError> {
        let poll = self.settings.api_poll();
        poll.run(cancel, || self.host.endpoint().run(command))
            .await
            .map(|_| ())
            .map_err(|err| ProvisionError::from_poll(step, poll.timeout(), err))
    }

    async fn remove_workloads(&self) -> Result<(), ProvisionError> {
        let command = RemoteCommand::StopAndRemovePods.render();
        let uncancellable = CancellationToken::new();
        self.settings
            .cleanup_retry()
            .run(&uncancellable, || {
                self.host
                    .endpoint()
                    .run(&command)
                    .map_err(Attempt::Retriable)
            })
            .await
            .map(|_| ())
            .map_err(|err| ProvisionError::from_retry(Step::RemoveWorkloads, err))
    }
}

fn note(errors: &mut ErrorCollector, result: Result<(), ProvisionError>) {
    if let Err(err) = &result {
        warn!(error = %err, "configure step failed, continuing");
    }
    errors.record(result);
}

#[cfg(test)]
mod tests;
