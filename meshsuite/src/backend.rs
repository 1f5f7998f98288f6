//! Client for the API container.
//!
//! Everything the suite asks of the backend goes through [`ApiContainerClient`].
//! Production code uses [`JsonRpcApiContainerClient`]; tests substitute a
//! recording mock.

use std::time::Duration;

use async_trait::async_trait;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use meshsuite_core::{MeshError, MeshResult};
use meshsuite_rpc::{
    ApiContainerApiClient, ExecCommandArgs, ExecCommandResponse, RegisterServiceArgs,
    RegisterServiceResponse, RegisterTestExecutionArgs, RemoveServiceArgs, RepartitionArgs,
    StartServiceArgs, StartServiceResponse, SuiteRegistrationResponse, TestExecutionInfo,
    TestSuiteMetadata, WaitForEndpointAvailabilityArgs,
};

/// Request timeout of the backend channel.
pub const BACKEND_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations the test suite invokes on the API container.
#[async_trait]
pub trait ApiContainerClient: Send + Sync {
    /// Announce the suite.
    async fn register_suite(&self) -> MeshResult<SuiteRegistrationResponse>;

    /// Push the suite metadata.
    async fn serialize_suite_metadata(&self, metadata: TestSuiteMetadata) -> MeshResult<()>;

    /// Name of the test to execute.
    async fn get_test_execution_info(&self) -> MeshResult<TestExecutionInfo>;

    /// Setup is starting.
    async fn register_test_setup(&self) -> MeshResult<()>;

    /// Setup is done.
    async fn register_test_setup_completion(&self) -> MeshResult<()>;

    /// Run is starting.
    async fn register_test_execution(&self, args: RegisterTestExecutionArgs) -> MeshResult<()>;

    /// Reserve address and paths for a service.
    async fn register_service(
        &self,
        args: RegisterServiceArgs,
    ) -> MeshResult<RegisterServiceResponse>;

    /// Start a registered service.
    async fn start_service(&self, args: StartServiceArgs) -> MeshResult<StartServiceResponse>;

    /// Stop and deregister a service.
    async fn remove_service(&self, args: RemoveServiceArgs) -> MeshResult<()>;

    /// Replace the network topology.
    async fn repartition(&self, args: RepartitionArgs) -> MeshResult<()>;

    /// Run a command in a service container.
    async fn exec_command(&self, args: ExecCommandArgs) -> MeshResult<ExecCommandResponse>;

    /// Wait for an HTTP endpoint of a service.
    async fn wait_for_endpoint_availability(
        &self,
        args: WaitForEndpointAvailabilityArgs,
    ) -> MeshResult<()>;
}

/// [`ApiContainerClient`] over HTTP JSON-RPC.
#[derive(Clone)]
pub struct JsonRpcApiContainerClient {
    client: HttpClient,
}

impl JsonRpcApiContainerClient {
    /// Client for the backend listening on `socket` (`host:port` or a full URL).
    ///
    /// No connection is made here; a backend that is not listening yet only
    /// shows up as failed calls, which registration retries.
    pub fn connect(socket: &str) -> MeshResult<Self> {
        let url = if socket.starts_with("http://") || socket.starts_with("https://") {
            socket.to_string()
        } else {
            format!("http://{socket}")
        };
        let client = HttpClientBuilder::default()
            .request_timeout(BACKEND_REQUEST_TIMEOUT)
            .build(&url)
            .map_err(|e| {
                MeshError::configuration("API_CONTAINER_SOCKET", format!("'{url}': {e}"))
            })?;
        Ok(Self { client })
    }
}

fn service_op(operation: &str, service_id: &impl std::fmt::Display) -> String {
    format!("{operation} (service '{service_id}')")
}

#[async_trait]
impl ApiContainerClient for JsonRpcApiContainerClient {
    async fn register_suite(&self) -> MeshResult<SuiteRegistrationResponse> {
        self.client
            .register_suite()
            .await
            .map_err(|e| MeshError::backend("register suite", e))
    }

    async fn serialize_suite_metadata(&self, metadata: TestSuiteMetadata) -> MeshResult<()> {
        self.client
            .serialize_suite_metadata(metadata)
            .await
            .map_err(|e| MeshError::backend("serialize suite metadata", e))
    }

    async fn get_test_execution_info(&self) -> MeshResult<TestExecutionInfo> {
        self.client
            .get_test_execution_info()
            .await
            .map_err(|e| MeshError::backend("get test execution info", e))
    }

    async fn register_test_setup(&self) -> MeshResult<()> {
        self.client
            .register_test_setup()
            .await
            .map_err(|e| MeshError::backend("register test setup", e))
    }

    async fn register_test_setup_completion(&self) -> MeshResult<()> {
        self.client
            .register_test_setup_completion()
            .await
            .map_err(|e| MeshError::backend("register test setup completion", e))
    }

    async fn register_test_execution(&self, args: RegisterTestExecutionArgs) -> MeshResult<()> {
        self.client
            .register_test_execution(args)
            .await
            .map_err(|e| MeshError::backend("register test execution", e))
    }

    async fn register_service(
        &self,
        args: RegisterServiceArgs,
    ) -> MeshResult<RegisterServiceResponse> {
        let operation = service_op("register service", &args.service_id);
        self.client
            .register_service(args)
            .await
            .map_err(|e| MeshError::backend(operation, e))
    }

    async fn start_service(&self, args: StartServiceArgs) -> MeshResult<StartServiceResponse> {
        let operation = service_op("start service", &args.service_id);
        self.client
            .start_service(args)
            .await
            .map_err(|e| MeshError::backend(operation, e))
    }

    async fn remove_service(&self, args: RemoveServiceArgs) -> MeshResult<()> {
        let operation = service_op("remove service", &args.service_id);
        self.client
            .remove_service(args)
            .await
            .map_err(|e| MeshError::backend(operation, e))
    }

    async fn repartition(&self, args: RepartitionArgs) -> MeshResult<()> {
        self.client
            .repartition(args)
            .await
            .map_err(|e| MeshError::backend("repartition", e))
    }

    async fn exec_command(&self, args: ExecCommandArgs) -> MeshResult<ExecCommandResponse> {
        let operation = service_op("exec command", &args.service_id);
        self.client
            .exec_command(args)
            .await
            .map_err(|e| MeshError::backend(operation, e))
    }

    async fn wait_for_endpoint_availability(
        &self,
        args: WaitForEndpointAvailabilityArgs,
    ) -> MeshResult<()> {
        let operation = service_op("wait for endpoint availability", &args.service_id);
        self.client
            .wait_for_endpoint_availability(args)
            .await
            .map_err(|e| MeshError::backend(operation, e))
    }
}
