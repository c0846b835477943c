//! Service lifecycle control on the remote node.

use std::fmt;

use tracing::debug;

use crate::command::RemoteCommand;
use crate::remote::{RemoteEndpoint, RemoteError};

/// Lifecycle action requested for a service.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServiceAction {
    /// Start the service.
    Start,
    /// Stop the service.
    Stop,
}

impl ServiceAction {
    /// Returns the verb understood by `systemctl`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Starts and stops named system services on the target host.
///
/// Implementations report only the immediate outcome of the request; service
/// health is never polled.
pub trait ServiceController {
    /// Requests that `service` be started.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the request fails.
    fn start(&self, service: &str) -> Result<(), RemoteError>;

    /// Requests that `service` be stopped.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the request fails.
    fn stop(&self, service: &str) -> Result<(), RemoteError>;
}

impl<S: ServiceController + ?Sized> ServiceController for &S {
    fn start(&self, service: &str) -> Result<(), RemoteError> {
        (**self).start(service)
    }

    fn stop(&self, service: &str) -> Result<(), RemoteError> {
        (**self).stop(service)
    }
}

/// [`ServiceController`] that drives `systemctl` over a [`RemoteEndpoint`].
#[derive(Clone, Debug)]
pub struct SystemdServices<E> {
    endpoint: E,
}

impl<E: RemoteEndpoint> SystemdServices<E> {
    /// Wraps `endpoint`.
    #[must_use]
    pub const fn new(endpoint: E) -> Self {
        Self { endpoint }
    }

    fn request(&self, action: ServiceAction, service: &str) -> Result<(), RemoteError> {
        let command = RemoteCommand::Systemctl { action, service }.render();
        let output = self.endpoint.run(&command)?;
        debug!(%action, service, output = %output.trim(), "systemctl finished");
        Ok(())
    }
}

impl<E: RemoteEndpoint> ServiceController for SystemdServices<E> {
    fn start(&self, service: &str) -> Result<(), RemoteError> {
        self.request(ServiceAction::Start, service)
    }

    fn stop(&self, service: &str) -> Result<(), RemoteError> {
        self.request(ServiceAction::Stop, service)
    }
}
