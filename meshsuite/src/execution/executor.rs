//! Process-level bootstrap of a test suite.

use std::sync::Arc;

use meshsuite_core::{MeshError, MeshResult, TokioTimeProvider};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::options::ExecutorOptions;
use super::registration::{dispatch, register_suite, RetryPolicy};
use crate::backend::{ApiContainerClient, JsonRpcApiContainerClient};
use crate::lifecycle::TestSuiteService;
use crate::logging;
use crate::server::{TestSuiteServer, SERVER_STOP_GRACE_PERIOD};
use crate::testsuite::TestSuite;

/// Suite-specific bootstrap supplied by the suite author.
pub trait TestSuiteConfigurator: Send + Sync {
    /// Install logging at `level`.
    fn set_log_level(&self, level: &str) -> MeshResult<()> {
        logging::init_logging(level)
    }

    /// Build the suite from its custom parameters.
    fn parse_params_and_create_suite(&self, params_json: &str) -> MeshResult<Box<dyn TestSuite>>;
}

/// Runs a test suite process from start to exit.
pub struct TestSuiteExecutor<C: TestSuiteConfigurator> {
    options: ExecutorOptions,
    configurator: C,
    retry_policy: RetryPolicy,
}

impl<C: TestSuiteConfigurator> TestSuiteExecutor<C> {
    /// Executor for `options`, building its suite with `configurator`.
    pub fn new(options: ExecutorOptions, configurator: C) -> Self {
        Self {
            options,
            configurator,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Override the registration retry policy.
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Run until the backend's request is served, or until a termination
    /// signal in metadata-only mode.
    pub async fn run(self) -> MeshResult<()> {
        let shutdown = CancellationToken::new();
        let signal_watcher = tokio::spawn(cancel_on_signal(shutdown.clone()));
        let result = self.run_until(shutdown).await;
        signal_watcher.abort();
        result
    }

    /// Like [`run`](Self::run), with shutdown driven by `shutdown` instead of signals.
    pub async fn run_until(self, shutdown: CancellationToken) -> MeshResult<()> {
        self.configurator.set_log_level(&self.options.log_level)?;
        if let Some(port) = self.options.debugger_port {
            info!(port, "debugger port provided");
        }

        let suite = self
            .configurator
            .parse_params_and_create_suite(&self.options.custom_params_json)?;

        let client = match &self.options.api_container_socket {
            Some(socket) => {
                let client: Arc<dyn ApiContainerClient> =
                    Arc::new(JsonRpcApiContainerClient::connect(socket)?);
                Some(client)
            }
            None => None,
        };

        let service = Arc::new(TestSuiteService::new(
            suite.as_ref(),
            client.clone(),
            self.options.suite_execution_volume.clone(),
        ));
        let server = TestSuiteServer::start(self.options.listen_addr, Arc::clone(&service)).await?;

        let result = match client {
            None => {
                info!("no API container socket provided, serving metadata until shutdown");
                shutdown.cancelled().await;
                Ok(())
            }
            Some(client) => {
                let time = TokioTimeProvider::new();
                let flow = async {
                    let action = register_suite(client.as_ref(), &time, self.retry_policy).await?;
                    dispatch(action, client.as_ref(), &service).await
                };
                tokio::select! {
                    result = flow => result,
                    _ = shutdown.cancelled() => Err(MeshError::Interrupted),
                }
            }
        };

        server.stop(SERVER_STOP_GRACE_PERIOD).await;
        result
    }
}

async fn cancel_on_signal(shutdown: CancellationToken) {
    wait_for_termination().await;
    info!("termination signal received");
    shutdown.cancel();
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        Err(err) => {
            warn!(error = %err, "cannot listen for SIGTERM, only ctrl-c will stop the suite");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = tokio::signal::ctrl_c().await;
}
