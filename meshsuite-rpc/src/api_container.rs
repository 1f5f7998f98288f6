//! Surface consumed from the API container (the orchestration backend).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use meshsuite_core::{
    PartitionConnectionInfo, PartitionConnections, PartitionId, ServiceId, StaticFileId,
};
use serde::{Deserialize, Serialize};

/// Wire value asking the suite to push its metadata.
pub const SERIALIZE_METADATA_ACTION: &str = "SERIALIZE_METADATA";

/// Wire value asking the suite to execute one test.
pub const EXECUTE_TEST_ACTION: &str = "EXECUTE_TEST";

/// What the backend wants this process to do after registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteAction {
    /// Push suite metadata and exit.
    SerializeSuiteMetadata,
    /// Run the test named by `getTestExecutionInfo`.
    ExecuteTest,
}

impl SuiteAction {
    /// Parse a wire action; `None` when unknown.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            SERIALIZE_METADATA_ACTION => Some(Self::SerializeSuiteMetadata),
            EXECUTE_TEST_ACTION => Some(Self::ExecuteTest),
            _ => None,
        }
    }

    /// Wire representation.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::SerializeSuiteMetadata => SERIALIZE_METADATA_ACTION,
            Self::ExecuteTest => EXECUTE_TEST_ACTION,
        }
    }
}

/// Reply to `registerSuite`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteRegistrationResponse {
    /// Raw action, see [`SuiteAction::from_wire`].
    pub suite_action: String,
}

/// Reply to `getTestExecutionInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestExecutionInfo {
    /// Test the backend wants executed.
    pub test_name: String,
}

/// Arguments of `registerTestExecution`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTestExecutionArgs {
    /// Run timeout the backend should enforce.
    pub timeout_seconds: u32,
}

/// Arguments of `registerService`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterServiceArgs {
    /// New service.
    pub service_id: ServiceId,
    /// Partition it joins.
    pub partition_id: PartitionId,
    /// Keys of the files the test will generate.
    pub files_to_generate: BTreeSet<String>,
    /// Static files the service needs.
    pub static_files: BTreeSet<StaticFileId>,
}

/// Reply to `registerService`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterServiceResponse {
    /// Generated file key to path relative to the suite execution volume.
    pub generated_files_relative_filepaths: HashMap<String, String>,
    /// Static file id to path relative to the suite execution volume.
    pub static_files_relative_filepaths: HashMap<StaticFileId, String>,
    /// Address assigned to the service.
    pub ip_addr: String,
}

/// Arguments of `startService`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartServiceArgs {
    /// Registered service.
    pub service_id: ServiceId,
    /// Image to run.
    pub docker_image: String,
    /// Ports the container listens on.
    pub used_ports: BTreeSet<String>,
    /// Entrypoint override; empty keeps the image's.
    pub entrypoint_args: Vec<String>,
    /// Command override; empty keeps the image's.
    pub cmd_args: Vec<String>,
    /// Extra environment variables.
    pub docker_env_vars: HashMap<String, String>,
    /// Where the suite execution volume is mounted in the container.
    pub suite_execution_vol_mnt_dirpath: String,
    /// Files artifact URL to mount directory.
    pub files_artifact_mount_dirpaths: HashMap<String, String>,
}

/// Host address a container port is published on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortBinding {
    /// Host interface.
    pub interface_ip: String,
    /// Host port.
    pub interface_port: String,
}

/// Reply to `startService`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartServiceResponse {
    /// Container port to host binding.
    pub used_ports_host_port_bindings: HashMap<String, PortBinding>,
}

/// Arguments of `removeService`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveServiceArgs {
    /// Service to stop.
    pub service_id: ServiceId,
    /// Grace period before the container is killed.
    pub container_stop_timeout_seconds: u64,
}

/// Arguments of `repartition`: the full topology, replacing the current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepartitionArgs {
    /// Members of each partition.
    pub partition_services: BTreeMap<PartitionId, BTreeSet<ServiceId>>,
    /// Directed policies, source then destination.
    pub partition_connections: PartitionConnections,
    /// Policy for unlisted pairs.
    pub default_connection: PartitionConnectionInfo,
}

/// Arguments of `execCommand`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecCommandArgs {
    /// Target service.
    pub service_id: ServiceId,
    /// argv to run inside the container.
    pub command_args: Vec<String>,
}

/// Reply to `execCommand`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecCommandResponse {
    /// Exit code of the command.
    pub exit_code: i32,
    /// Combined stdout and stderr.
    pub log_output: String,
}

/// Arguments of `waitForEndpointAvailability`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitForEndpointAvailabilityArgs {
    /// Service exposing the endpoint.
    pub service_id: ServiceId,
    /// Container port.
    pub port: u16,
    /// HTTP path to GET.
    pub path: String,
    /// Delay before the first request.
    pub initial_delay_seconds: u32,
    /// Number of requests.
    pub retries: u32,
    /// Delay between requests.
    pub retries_delay_milliseconds: u32,
    /// Expected response body; empty accepts any body.
    pub body_text: String,
}

/// The API container's JSON-RPC surface.
#[rpc(client, server, namespace = "apiContainer")]
pub trait ApiContainerApi {
    /// Announce this test suite; the reply says what to do next.
    #[method(name = "registerSuite")]
    async fn register_suite(&self) -> RpcResult<SuiteRegistrationResponse>;

    /// Push the suite metadata.
    #[method(name = "serializeSuiteMetadata")]
    async fn serialize_suite_metadata(
        &self,
        metadata: crate::test_suite::TestSuiteMetadata,
    ) -> RpcResult<()>;

    /// Which test to execute.
    #[method(name = "getTestExecutionInfo")]
    async fn get_test_execution_info(&self) -> RpcResult<TestExecutionInfo>;

    /// Setup is about to start; the backend starts the setup timer.
    #[method(name = "registerTestSetup")]
    async fn register_test_setup(&self) -> RpcResult<()>;

    /// Setup finished.
    #[method(name = "registerTestSetupCompletion")]
    async fn register_test_setup_completion(&self) -> RpcResult<()>;

    /// Run is about to start under the given timeout.
    #[method(name = "registerTestExecution")]
    async fn register_test_execution(&self, args: RegisterTestExecutionArgs) -> RpcResult<()>;

    /// Reserve an IP address and file paths for a new service.
    #[method(name = "registerService")]
    async fn register_service(
        &self,
        args: RegisterServiceArgs,
    ) -> RpcResult<RegisterServiceResponse>;

    /// Start a registered service's container.
    #[method(name = "startService")]
    async fn start_service(&self, args: StartServiceArgs) -> RpcResult<StartServiceResponse>;

    /// Stop and deregister a service.
    #[method(name = "removeService")]
    async fn remove_service(&self, args: RemoveServiceArgs) -> RpcResult<()>;

    /// Replace the network topology.
    #[method(name = "repartition")]
    async fn repartition(&self, args: RepartitionArgs) -> RpcResult<()>;

    /// Run a command inside a service container.
    #[method(name = "execCommand")]
    async fn exec_command(&self, args: ExecCommandArgs) -> RpcResult<ExecCommandResponse>;

    /// Block until an HTTP endpoint of a service answers.
    #[method(name = "waitForEndpointAvailability")]
    async fn wait_for_endpoint_availability(
        &self,
        args: WaitForEndpointAvailabilityArgs,
    ) -> RpcResult<()>;
}
