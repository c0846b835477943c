//! Core library for the clusterseed node provisioning tool.
//!
//! The crate seeds a freshly booted cluster node over SSH: it installs a
//! kubeconfig, replaces the placeholder pull secret, assigns a new cluster
//! identifier, and resets the kubelet's workloads. Remote access and service
//! control sit behind the [`RemoteEndpoint`] and [`ServiceController`]
//! traits so the orchestration can run against in-memory doubles.

pub mod command;
pub mod config;
pub mod configure;
pub mod error;
pub mod install;
pub mod provision;
pub mod remote;
pub mod retry;
pub mod secret;
pub mod service;
pub mod test_support;

pub use command::{CommandError, FileWrite, HEREDOC_DELIMITER, Privilege, RemoteCommand};
pub use config::{ConfigError, ProvisionSettings, SshConfig};
pub use configure::{ClusterConfigurer, ConfigureState};
pub use error::{ErrorCollector, ProvisionError, Step};
pub use install::{KUBECONFIG_PATH, KUBELET_PULL_SECRET_PATH, PULL_SECRET_MANIFEST_PATH, install};
pub use provision::{ProvisionInputs, ProvisioningOrchestrator, read_local_input};
pub use remote::{
    CommandOutput, CommandRunner, ProcessCommandRunner, RemoteEndpoint, RemoteError, RemoteHost,
    SshEndpoint,
};
pub use retry::{Attempt, BoundedPoll, PollError, RetryError, RetryPolicy};
pub use secret::{ClusterId, ClusterIdSource, Kubeconfig, PullSecret, UuidClusterIds};
pub use service::{ServiceAction, ServiceController, SystemdServices};
