//! Single-command file installation on the remote node.

use camino::Utf8Path;
use tracing::debug;

use crate::command::{FileWrite, Privilege};
use crate::error::{ProvisionError, Step};
use crate::remote::RemoteEndpoint;

/// Remote location of the kubeconfig used by the cluster API steps.
pub const KUBECONFIG_PATH: &str = "/tmp/kubeconfig";

/// Remote location of the pull secret `Secret` manifest.
pub const PULL_SECRET_MANIFEST_PATH: &str = "/tmp/pull-secret.yaml";

/// Location the kubelet reads registry credentials from.
pub const KUBELET_PULL_SECRET_PATH: &str = "/var/lib/kubelet/config.json";

/// Writes `content` to `path` on the node, overwriting any existing file.
///
/// The content is validated before anything is sent, so a rejected payload
/// never reaches the endpoint.
///
/// # Errors
///
/// Returns [`ProvisionError::Payload`] when the content cannot be embedded,
/// or [`ProvisionError::CommandFailed`] when the remote write fails.
pub fn install<E>(
    endpoint: &E,
    step: Step,
    path: &Utf8Path,
    content: &str,
    privilege: Privilege,
) -> Result<(), ProvisionError>
where
    E: RemoteEndpoint + ?Sized,
{
    let command = FileWrite::new(path, content, privilege)
        .render()
        .map_err(|source| ProvisionError::Payload { step, source })?;
    let output = endpoint
        .run(&command)
        .map_err(|source| ProvisionError::CommandFailed { step, source })?;
    debug!(%step, %path, bytes = content.len(), output = %output.trim(), "file installed");
    Ok(())
}
