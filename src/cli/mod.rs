//! Command-line interface definitions for the `clusterseed` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `clusterseed` binary.
#[derive(Debug, Parser)]
#[command(
    name = "clusterseed",
    about = "Seed a freshly booted cluster node with credentials and a cluster identity",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Install credentials, assign a cluster ID, and reset the kubelet.
    #[command(
        name = "provision",
        about = "Install credentials, assign a cluster ID, and reset the kubelet"
    )]
    Provision(ProvisionCommand),
}

/// Arguments for the `clusterseed provision` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ProvisionCommand {
    /// Address or host name of the node to provision.
    #[arg(long, value_name = "HOST")]
    pub(crate) host: String,
    /// Local kubeconfig granting access to the node's cluster API.
    #[arg(long, value_name = "PATH")]
    pub(crate) kubeconfig: String,
    /// Local pull secret file with registry credentials.
    #[arg(long, value_name = "PATH")]
    pub(crate) pull_secret: String,
    /// Override the SSH port from configuration.
    #[arg(long, value_name = "PORT")]
    pub(crate) port: Option<u16>,
    /// Log debug output to stderr (ignored when `RUST_LOG` is set).
    #[arg(short, long)]
    pub(crate) verbose: bool,
}
