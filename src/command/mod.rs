//! Typed remote command builder.
//!
//! Every shell string sent to the node is produced here. Paths and JSON
//! arguments are shell-escaped, and file payloads travel inside a quoted
//! heredoc so the remote shell performs no expansion on them.

use camino::Utf8Path;
use serde_json::json;
use shell_escape::unix::escape;
use thiserror::Error;

use crate::secret::ClusterId;
use crate::service::ServiceAction;

/// Token bounding embedded file content.
pub const HEREDOC_DELIMITER: &str = "CLUSTERSEED_EOF";

/// Errors raised while rendering a command.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CommandError {
    /// Raised when content would terminate its own heredoc early.
    #[error("content for {path} contains the reserved delimiter {}", HEREDOC_DELIMITER)]
    DelimiterInContent {
        /// Remote path the content was destined for.
        path: String,
    },
}

/// Whether a write needs root on the node.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Privilege {
    /// Write as the SSH user.
    User,
    /// Write through `sudo`.
    Root,
}

/// Single-command write of `content` to `path`.
#[derive(Clone, Copy, Debug)]
pub struct FileWrite<'a> {
    path: &'a Utf8Path,
    content: &'a str,
    privilege: Privilege,
}

impl<'a> FileWrite<'a> {
    /// Describes a write of `content` to `path`.
    #[must_use]
    pub const fn new(path: &'a Utf8Path, content: &'a str, privilege: Privilege) -> Self {
        Self {
            path,
            content,
            privilege,
        }
    }

    /// Renders the heredoc command.
    ///
    /// The heredoc appends a newline after the body; `head -c -1` drops it so
    /// the file holds exactly `content`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::DelimiterInContent`] when `content` contains
    /// [`HEREDOC_DELIMITER`].
    pub fn render(&self) -> Result<String, CommandError> {
        if self.content.contains(HEREDOC_DELIMITER) {
            return Err(CommandError::DelimiterInContent {
                path: self.path.to_string(),
            });
        }

        let tee = match self.privilege {
            Privilege::User => "tee",
            Privilege::Root => "sudo tee",
        };
        let escaped_path = escape(self.path.as_str().into());
        Ok(format!(
            "cat <<'{HEREDOC_DELIMITER}' | head -c -1 | {tee} {escaped_path} >/dev/null\n{content}\n{HEREDOC_DELIMITER}",
            content = self.content,
        ))
    }
}

/// Remote commands without an embedded payload.
#[derive(Clone, Copy, Debug)]
pub enum RemoteCommand<'a> {
    /// Print a file's content.
    ReadFile {
        /// File to read.
        path: &'a Utf8Path,
    },
    /// Apply the pull secret manifest with the cluster config client.
    ReplacePullSecret {
        /// Kubeconfig granting API access.
        kubeconfig: &'a Utf8Path,
        /// Manifest to apply.
        manifest: &'a Utf8Path,
    },
    /// Merge-patch the cluster version object with a new identifier.
    PatchClusterId {
        /// Kubeconfig granting API access.
        kubeconfig: &'a Utf8Path,
        /// Identifier to assign.
        cluster_id: &'a ClusterId,
    },
    /// Stop and remove every pod sandbox known to the container runtime.
    StopAndRemovePods,
    /// Start or stop a systemd unit.
    Systemctl {
        /// Lifecycle action.
        action: ServiceAction,
        /// Unit name.
        service: &'a str,
    },
}

impl RemoteCommand<'_> {
    /// Renders the command as a shell string.
    #[must_use]
    pub fn render(&self) -> String {
        match *self {
            Self::ReadFile { path } => format!("cat {}", escape(path.as_str().into())),
            Self::ReplacePullSecret {
                kubeconfig,
                manifest,
            } => format!(
                "oc --kubeconfig {} replace -f {}",
                escape(kubeconfig.as_str().into()),
                escape(manifest.as_str().into())
            ),
            Self::PatchClusterId {
                kubeconfig,
                cluster_id,
            } => {
                let patch = json!({ "spec": { "clusterID": cluster_id.as_str() } }).to_string();
                format!(
                    "oc --kubeconfig {} patch clusterversion version --type merge -p {}",
                    escape(kubeconfig.as_str().into()),
                    escape(patch.into())
                )
            }
            Self::StopAndRemovePods => String::from(concat!(
                "pods=$(sudo crictl pods -q); ",
                "if [ -n \"$pods\" ]; then ",
                "sudo crictl stopp $pods && sudo crictl rmp $(sudo crictl pods -q); ",
                "fi"
            )),
            Self::Systemctl { action, service } => format!(
                "sudo systemctl {} {}",
                action.as_str(),
                escape(service.into())
            ),
        }
    }
}
