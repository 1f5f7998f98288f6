//! JSON-RPC server exposing a [`TestSuiteService`] to the API container.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use meshsuite_core::{ErrorKind, MeshError, MeshResult};
use meshsuite_rpc::error::{
    error_object, BACKEND_CODE, CONFIGURATION_CODE, INTERNAL_CODE, ORDERING_CODE,
    PROTOCOL_VIOLATION_CODE, TEST_FAULT_CODE,
};
use meshsuite_rpc::{CopyStaticFilesArgs, SetupTestArgs, TestSuiteApiServer, TestSuiteMetadata};
use tracing::{info, warn};

use crate::lifecycle::TestSuiteService;

/// Grace period given to in-flight calls when the server stops.
pub const SERVER_STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);

fn to_rpc_error(err: MeshError) -> ErrorObjectOwned {
    let code = match err.kind() {
        ErrorKind::TestFault => TEST_FAULT_CODE,
        ErrorKind::Ordering => ORDERING_CODE,
        ErrorKind::ProtocolViolation => PROTOCOL_VIOLATION_CODE,
        ErrorKind::Configuration => CONFIGURATION_CODE,
        ErrorKind::Backend => BACKEND_CODE,
        ErrorKind::Transient | ErrorKind::Internal => INTERNAL_CODE,
    };
    error_object(code, err.to_string())
}

/// RPC adapter over a shared [`TestSuiteService`].
pub struct TestSuiteRpc {
    service: Arc<TestSuiteService>,
}

impl TestSuiteRpc {
    /// Adapter for `service`.
    pub fn new(service: Arc<TestSuiteService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TestSuiteApiServer for TestSuiteRpc {
    async fn is_available(&self) -> RpcResult<()> {
        if self.service.is_available() {
            Ok(())
        } else {
            Err(error_object(INTERNAL_CODE, "test suite is not available"))
        }
    }

    async fn get_test_suite_metadata(&self) -> RpcResult<TestSuiteMetadata> {
        Ok(self.service.get_test_suite_metadata())
    }

    async fn setup_test(&self, args: SetupTestArgs) -> RpcResult<()> {
        self.service
            .setup_test(&args.test_name)
            .await
            .map_err(to_rpc_error)
    }

    async fn run_test(&self) -> RpcResult<()> {
        self.service.run_test().await.map_err(to_rpc_error)
    }

    async fn copy_static_files_to_execution_volume(
        &self,
        args: CopyStaticFilesArgs,
    ) -> RpcResult<()> {
        self.service
            .copy_static_files_to_execution_volume(&args.static_file_dest_relative_filepaths)
            .await
            .map_err(to_rpc_error)
    }
}

/// A running test suite server.
pub struct TestSuiteServer {
    handle: ServerHandle,
    local_addr: SocketAddr,
}

impl TestSuiteServer {
    /// Bind `listen_addr` and start serving `service`.
    pub async fn start(
        listen_addr: SocketAddr,
        service: Arc<TestSuiteService>,
    ) -> MeshResult<Self> {
        let server = Server::builder()
            .build(listen_addr)
            .await
            .map_err(|e| {
                MeshError::io(format!("binding test suite server to {listen_addr}"), e)
            })?;
        let local_addr = server
            .local_addr()
            .map_err(|e| MeshError::io("reading test suite server address", e))?;
        let handle = server.start(TestSuiteRpc::new(service).into_rpc());
        info!(%local_addr, "test suite server listening");
        Ok(Self { handle, local_addr })
    }

    /// Address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting calls and wait up to `grace` for in-flight ones.
    pub async fn stop(self, grace: Duration) {
        if self.handle.stop().is_err() {
            return;
        }
        let stopped = tokio::time::timeout(grace, self.handle.stopped()).await;
        if stopped.is_err() {
            warn!(?grace, "test suite server did not stop within its grace period");
        } else {
            info!("test suite server stopped");
        }
    }
}
