//! Binary entry point for the clusterseed CLI.

use std::io::{self, Write};
use std::process;

use camino::Utf8Path;
use clap::Parser;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use clusterseed::{
    ConfigError, ProvisionError, ProvisionSettings, ProvisioningOrchestrator, RemoteHost,
    SshConfig, SshEndpoint, SystemdServices, UuidClusterIds,
};

mod cli;

use cli::{Cli, ProvisionCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("provisioning failed: {0}")]
    Provision(#[from] ProvisionError),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::Provision(command) => provision(command).await,
    }
}

async fn provision(command: ProvisionCommand) -> Result<(), CliError> {
    init_tracing(command.verbose);

    let mut ssh = SshConfig::load_without_cli_args()?;
    if let Some(port) = command.port {
        ssh.port = port;
    }
    let settings = ProvisionSettings::load_without_cli_args()?;
    settings.validate()?;

    let endpoint = SshEndpoint::with_process_runner(ssh, command.host)?;
    let services = SystemdServices::new(&endpoint);
    let host = RemoteHost::new(&endpoint, services);
    let orchestrator = ProvisioningOrchestrator::with_settings(UuidClusterIds, settings);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling after cleanup");
            interrupt.cancel();
        }
    });

    orchestrator
        .provision_from_files(
            &host,
            Utf8Path::new(&command.kubeconfig),
            Utf8Path::new(&command.pull_secret),
            &cancel,
        )
        .await?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .init();
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
