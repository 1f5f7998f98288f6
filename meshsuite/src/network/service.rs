//! Handles to running services.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use meshsuite_core::{MeshResult, ServiceId};
use meshsuite_rpc::ExecCommandArgs;
use tracing::debug;

use crate::backend::ApiContainerClient;

/// Result of a command run inside a service container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code of the command.
    pub exit_code: i32,
    /// Combined stdout and stderr.
    pub log_output: String,
}

impl ExecOutput {
    /// Whether the command exited with code 0.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A service started in the test network.
#[derive(Clone)]
pub struct ServiceContext {
    client: Arc<dyn ApiContainerClient>,
    service_id: ServiceId,
    ip_address: String,
}

impl ServiceContext {
    pub(crate) fn new(
        client: Arc<dyn ApiContainerClient>,
        service_id: ServiceId,
        ip_address: String,
    ) -> Self {
        Self {
            client,
            service_id,
            ip_address,
        }
    }

    /// Id the service was added under.
    pub fn service_id(&self) -> &ServiceId {
        &self.service_id
    }

    /// Address of the service inside the test network.
    pub fn ip_address(&self) -> &str {
        &self.ip_address
    }

    /// Run `command` inside the container and wait for it to exit.
    ///
    /// A non-zero exit code is not an error; only a failure of the backend to
    /// run the command is.
    pub async fn exec_command<I, S>(&self, command: I) -> MeshResult<ExecOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command_args: Vec<String> = command.into_iter().map(Into::into).collect();
        debug!(service_id = %self.service_id, ?command_args, "executing command");
        let response = self
            .client
            .exec_command(ExecCommandArgs {
                service_id: self.service_id.clone(),
                command_args,
            })
            .await?;
        Ok(ExecOutput {
            exit_code: response.exit_code,
            log_output: response.log_output,
        })
    }
}

impl fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContext")
            .field("service_id", &self.service_id)
            .field("ip_address", &self.ip_address)
            .finish()
    }
}

/// HTTP endpoint readiness check delegated to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointCheck {
    /// Container port serving the endpoint.
    pub port: u16,
    /// Path to request.
    pub path: String,
    /// Delay before the first request.
    pub initial_delay: Duration,
    /// Number of requests.
    pub retries: u32,
    /// Delay between requests.
    pub retry_delay: Duration,
    /// Body the endpoint must return; `None` accepts any.
    pub body_text: Option<String>,
}

impl EndpointCheck {
    /// Check `path` on `port`: no initial delay, 10 requests 1 s apart.
    pub fn new(port: u16, path: impl Into<String>) -> Self {
        Self {
            port,
            path: path.into(),
            initial_delay: Duration::ZERO,
            retries: 10,
            retry_delay: Duration::from_secs(1),
            body_text: None,
        }
    }
}
