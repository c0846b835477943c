//! Credential payloads and cluster identity.
//!
//! Payloads are opaque: nothing here parses the kubeconfig or the pull
//! secret. The only transformation is the base64 embedding required by the
//! `Secret` manifest.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use uuid::Uuid;

/// Namespace of the cluster-wide pull secret object.
pub const PULL_SECRET_NAMESPACE: &str = "openshift-config";

/// Name of the cluster-wide pull secret object.
pub const PULL_SECRET_NAME: &str = "pull-secret";

/// User supplied registry credentials.
#[derive(Clone, Eq, PartialEq)]
pub struct PullSecret(String);

impl PullSecret {
    /// Wraps a raw pull secret payload.
    #[must_use]
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    /// Returns the payload exactly as supplied.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Renders the `Secret` manifest that replaces the cluster's placeholder
    /// pull secret.
    #[must_use]
    pub fn manifest(&self) -> String {
        let encoded = STANDARD.encode(self.0.as_bytes());
        format!(
            concat!(
                "apiVersion: v1\n",
                "data:\n",
                "  .dockerconfigjson: {encoded}\n",
                "kind: Secret\n",
                "metadata:\n",
                "  name: {name}\n",
                "  namespace: {namespace}\n",
                "type: kubernetes.io/dockerconfigjson"
            ),
            encoded = encoded,
            name = PULL_SECRET_NAME,
            namespace = PULL_SECRET_NAMESPACE,
        )
    }
}

impl fmt::Debug for PullSecret {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "PullSecret(<{} bytes>)", self.0.len())
    }
}

/// Kubeconfig granting access to the node's cluster API.
#[derive(Clone, Eq, PartialEq)]
pub struct Kubeconfig(String);

impl Kubeconfig {
    /// Wraps a raw kubeconfig document.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self(content.into())
    }

    /// Returns the document exactly as supplied.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Kubeconfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "Kubeconfig(<{} bytes>)", self.0.len())
    }
}

/// Identifier assigned to the cluster during provisioning.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ClusterId(String);

impl ClusterId {
    /// Wraps an identifier produced by a [`ClusterIdSource`].
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Produces fresh cluster identifiers.
pub trait ClusterIdSource {
    /// Returns a new, globally unique identifier.
    fn next_id(&self) -> ClusterId;
}

impl<I: ClusterIdSource + ?Sized> ClusterIdSource for &I {
    fn next_id(&self) -> ClusterId {
        (**self).next_id()
    }
}

/// Random UUID v4 identifiers.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidClusterIds;

impl ClusterIdSource for UuidClusterIds {
    fn next_id(&self) -> ClusterId {
        ClusterId(Uuid::new_v4().to_string())
    }
}
