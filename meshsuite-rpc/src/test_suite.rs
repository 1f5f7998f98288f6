//! Surface the test suite exposes to the API container.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use meshsuite_core::StaticFileId;
use serde::{Deserialize, Serialize};

/// What the backend needs to know about one test before running it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMetadata {
    /// Whether the test repartitions its network.
    pub is_partitioning_enabled: bool,
    /// Files artifact URLs the test mounts.
    pub used_artifact_urls: BTreeSet<String>,
    /// Setup timeout the backend enforces.
    pub test_setup_timeout_in_seconds: u32,
    /// Run timeout the backend enforces.
    pub test_run_timeout_in_seconds: u32,
}

/// Metadata of the whole suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuiteMetadata {
    /// Per-test metadata, by test name.
    pub test_metadata: BTreeMap<String, TestMetadata>,
    /// Width of the address space each test network needs.
    pub network_width_bits: u32,
    /// Static files the suite ships.
    pub static_files: BTreeSet<StaticFileId>,
}

/// Arguments of `setupTest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupTestArgs {
    /// Test to set up.
    pub test_name: String,
}

/// Arguments of `copyStaticFilesToExecutionVolume`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyStaticFilesArgs {
    /// Static file id to destination relative to the suite execution volume.
    pub static_file_dest_relative_filepaths: HashMap<StaticFileId, String>,
}

/// The test suite's JSON-RPC surface.
#[rpc(client, server, namespace = "testSuite")]
pub trait TestSuiteApi {
    /// Liveness probe.
    #[method(name = "isAvailable")]
    async fn is_available(&self) -> RpcResult<()>;

    /// Metadata of every test in the suite.
    #[method(name = "getTestSuiteMetadata")]
    async fn get_test_suite_metadata(&self) -> RpcResult<TestSuiteMetadata>;

    /// Set up a test's network.
    #[method(name = "setupTest")]
    async fn setup_test(&self, args: SetupTestArgs) -> RpcResult<()>;

    /// Run the test that was set up.
    #[method(name = "runTest")]
    async fn run_test(&self) -> RpcResult<()>;

    /// Copy the suite's static files into the execution volume.
    #[method(name = "copyStaticFilesToExecutionVolume")]
    async fn copy_static_files_to_execution_volume(
        &self,
        args: CopyStaticFilesArgs,
    ) -> RpcResult<()>;
}
