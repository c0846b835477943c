//! Top-level provisioning sequence.
//!
//! The orchestrator installs the kubeconfig and the pull secret manifest,
//! runs the configure bracket, and finally hands the raw pull secret to the
//! kubelet. The installs are fail-fast; the configure bracket reports its
//! collected failures only after it has cleaned up.

use camino::Utf8Path;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::command::Privilege;
use crate::config::ProvisionSettings;
use crate::configure::ClusterConfigurer;
use crate::error::{ProvisionError, Step};
use crate::install::{
    KUBECONFIG_PATH, KUBELET_PULL_SECRET_PATH, PULL_SECRET_MANIFEST_PATH, install,
};
use crate::remote::{RemoteEndpoint, RemoteHost};
use crate::secret::{ClusterIdSource, Kubeconfig, PullSecret, UuidClusterIds};
use crate::service::ServiceController;

mod inputs;

pub use inputs::read_local_input;

/// Credentials installed on the node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionInputs {
    /// Kubeconfig granting access to the node's cluster API.
    pub kubeconfig: Kubeconfig,
    /// Registry credentials replacing the cluster's placeholder.
    pub pull_secret: PullSecret,
}

impl ProvisionInputs {
    /// Bundles the two payloads.
    #[must_use]
    pub const fn new(kubeconfig: Kubeconfig, pull_secret: PullSecret) -> Self {
        Self {
            kubeconfig,
            pull_secret,
        }
    }

    /// Reads both payloads from local files.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::LocalInput`] for the first file that cannot
    /// be read.
    pub fn from_files(
        kubeconfig_path: &Utf8Path,
        pull_secret_path: &Utf8Path,
    ) -> Result<Self, ProvisionError> {
        let kubeconfig = read_local_input(kubeconfig_path)?;
        let pull_secret = read_local_input(pull_secret_path)?;
        Ok(Self::new(
            Kubeconfig::new(kubeconfig),
            PullSecret::new(pull_secret),
        ))
    }
}

/// Provisions nodes with a cluster identity drawn from `I`.
#[derive(Debug)]
pub struct ProvisioningOrchestrator<I> {
    ids: I,
    settings: ProvisionSettings,
}

impl ProvisioningOrchestrator<UuidClusterIds> {
    /// Creates an orchestrator with random identifiers and default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(UuidClusterIds, ProvisionSettings::default())
    }
}

impl Default for ProvisioningOrchestrator<UuidClusterIds> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ClusterIdSource> ProvisioningOrchestrator<I> {
    /// Creates an orchestrator with an explicit identifier source and
    /// settings.
    #[must_use]
    pub const fn with_settings(ids: I, settings: ProvisionSettings) -> Self {
        Self { ids, settings }
    }

    /// Returns the configure phase settings.
    #[must_use]
    pub const fn settings(&self) -> &ProvisionSettings {
        &self.settings
    }

    /// Provisions `host` with `inputs`.
    ///
    /// Cancelling `cancel` interrupts the cluster API polls, still runs the
    /// cleanup bracket, and skips the final pull secret install.
    ///
    /// # Errors
    ///
    /// Returns the first fatal install failure, otherwise the aggregated
    /// configure failures. When the final install fails after the configure
    /// phase already failed, the install failure wins and the aggregate is
    /// logged.
    pub async fn provision<E, S>(
        &self,
        host: &RemoteHost<E, S>,
        inputs: &ProvisionInputs,
        cancel: &CancellationToken,
    ) -> Result<(), ProvisionError>
    where
        E: RemoteEndpoint,
        S: ServiceController,
    {
        info!(step = %Step::InstallKubeconfig, "provisioning step started");
        install(
            host.endpoint(),
            Step::InstallKubeconfig,
            Utf8Path::new(KUBECONFIG_PATH),
            inputs.kubeconfig.as_str(),
            Privilege::User,
        )?;

        info!(step = %Step::InstallPullSecretManifest, "provisioning step started");
        install(
            host.endpoint(),
            Step::InstallPullSecretManifest,
            Utf8Path::new(PULL_SECRET_MANIFEST_PATH),
            &inputs.pull_secret.manifest(),
            Privilege::User,
        )?;

        info!("configuring cluster");
        let configured = ClusterConfigurer::new(host, &self.ids, &self.settings)
            .run(cancel)
            .await;

        if cancel.is_cancelled() {
            warn!("provisioning cancelled, pull secret not persisted");
            return configured;
        }

        info!(step = %Step::PersistPullSecret, "provisioning step started");
        if let Err(err) = install(
            host.endpoint(),
            Step::PersistPullSecret,
            Utf8Path::new(KUBELET_PULL_SECRET_PATH),
            inputs.pull_secret.as_str(),
            Privilege::Root,
        ) {
            if let Err(ref superseded) = configured {
                error!(error = %superseded, "configure failures superseded by pull secret install failure");
            }
            return Err(err);
        }

        configured
    }

    /// Reads the kubeconfig and pull secret from local files, then calls
    /// [`Self::provision`].
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::LocalInput`] before any remote command when
    /// either file cannot be read, otherwise as [`Self::provision`].
    pub async fn provision_from_files<E, S>(
        &self,
        host: &RemoteHost<E, S>,
        kubeconfig_path: &Utf8Path,
        pull_secret_path: &Utf8Path,
        cancel: &CancellationToken,
    ) -> Result<(), ProvisionError>
    where
        E: RemoteEndpoint,
        S: ServiceController,
    {
        let inputs = ProvisionInputs::from_files(kubeconfig_path, pull_secret_path)?;
        self.provision(host, &inputs, cancel).await
    }
}
