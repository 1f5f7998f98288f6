//! Tests and test suites.
//!
//! A [`Test`] declares its [`TestConfiguration`], builds a network in
//! [`Test::setup`] and exercises it in [`Test::run`]. The value `setup`
//! returns is handed to `run` as is, typed by [`Test::Network`].
//!
//! # Usage
//!
//! ```ignore
//! struct PingTest;
//!
//! #[async_trait]
//! impl Test for PingTest {
//!     type Network = ServiceContext;
//!
//!     async fn setup(&self, network: NetworkContext) -> TestResult<ServiceContext> {
//!         let (service, _) = network
//!             .add_service(ServiceId::new("box"), ContainerCreationConfig::new("alpine"), |_, _, _| {
//!                 Ok(ContainerRunConfig::default())
//!             })
//!             .await?;
//!         Ok(service)
//!     }
//!
//!     async fn run(&self, service: ServiceContext) -> TestResult<()> {
//!         let output = service.exec_command(["true"]).await?;
//!         ensure(output.is_success(), "true should succeed")
//!     }
//! }
//!
//! let tests = TestRegistry::new().test("pingTest", PingTest);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use meshsuite_core::{MeshResult, StaticFileId, TestConfiguration, TestResult};
use meshsuite_rpc::{TestMetadata, TestSuiteMetadata};

use crate::network::NetworkContext;

/// A single test.
#[async_trait]
pub trait Test: Send + Sync + 'static {
    /// Whatever `setup` builds and `run` needs.
    type Network: Send + 'static;

    /// Requirements of this test. Defaults to [`TestConfiguration::default`].
    fn configuration(&self) -> TestConfiguration {
        TestConfiguration::default()
    }

    /// Build the test network.
    async fn setup(&self, network: NetworkContext) -> TestResult<Self::Network>;

    /// Exercise the network built by `setup`.
    async fn run(&self, network: Self::Network) -> TestResult<()>;
}

/// Object-safe view of a [`Test`].
#[async_trait]
pub(crate) trait DynTest: Send + Sync {
    fn configuration(&self) -> TestConfiguration;

    async fn setup(&self, network: NetworkContext) -> TestResult<Box<dyn PreparedTest>>;
}

/// A test whose network is built, waiting to run.
#[async_trait]
pub(crate) trait PreparedTest: Send {
    async fn run(self: Box<Self>) -> TestResult<()>;
}

struct TestEntry<T: Test>(Arc<T>);

struct Prepared<T: Test> {
    test: Arc<T>,
    network: T::Network,
}

#[async_trait]
impl<T: Test> DynTest for TestEntry<T> {
    fn configuration(&self) -> TestConfiguration {
        self.0.configuration()
    }

    async fn setup(&self, network: NetworkContext) -> TestResult<Box<dyn PreparedTest>> {
        let network = self.0.setup(network).await?;
        Ok(Box::new(Prepared {
            test: Arc::clone(&self.0),
            network,
        }))
    }
}

#[async_trait]
impl<T: Test> PreparedTest for Prepared<T> {
    async fn run(self: Box<Self>) -> TestResult<()> {
        let Prepared { test, network } = *self;
        test.run(network).await
    }
}

/// Tests of a suite, by name.
#[derive(Clone, Default)]
pub struct TestRegistry {
    tests: BTreeMap<String, Arc<dyn DynTest>>,
}

impl TestRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a test under `name`, replacing any test already there.
    pub fn test<T: Test>(mut self, name: impl Into<String>, test: T) -> Self {
        let entry = TestEntry(Arc::new(test));
        self.tests.insert(name.into(), Arc::new(entry));
        self
    }

    /// Whether `name` is a test of this registry.
    pub fn contains(&self, name: &str) -> bool {
        self.tests.contains_key(name)
    }

    /// Test names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tests.keys().map(String::as_str)
    }

    /// Configuration of test `name`.
    pub fn configuration(&self, name: &str) -> Option<TestConfiguration> {
        self.tests.get(name).map(|test| test.configuration())
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<dyn DynTest>> {
        self.tests.get(name).cloned()
    }
}

/// A collection of tests sharing a process.
pub trait TestSuite: Send + Sync + 'static {
    /// Every test of the suite.
    fn tests(&self) -> TestRegistry;

    /// Width, in bits, of the address space each test network needs.
    fn network_width_bits(&self) -> u32;

    /// Files shipped with the suite, by id, as paths inside this process's filesystem.
    fn static_files(&self) -> HashMap<StaticFileId, PathBuf> {
        HashMap::new()
    }
}

/// Derive the suite metadata without running anything.
pub(crate) fn suite_metadata(
    tests: &TestRegistry,
    network_width_bits: u32,
    static_files: &HashMap<StaticFileId, PathBuf>,
) -> TestSuiteMetadata {
    let test_metadata = tests
        .tests
        .iter()
        .map(|(name, test)| {
            let config = test.configuration();
            let metadata = TestMetadata {
                is_partitioning_enabled: config.is_partitioning_enabled(),
                used_artifact_urls: config.files_artifact_urls().values().cloned().collect(),
                test_setup_timeout_in_seconds: config.setup_timeout_seconds(),
                test_run_timeout_in_seconds: config.run_timeout_seconds(),
            };
            (name.clone(), metadata)
        })
        .collect();
    TestSuiteMetadata {
        test_metadata,
        network_width_bits,
        static_files: static_files.keys().cloned().collect::<BTreeSet<_>>(),
    }
}

/// Look up `name`, treating absence as a protocol violation.
pub(crate) fn resolve(tests: &TestRegistry, name: &str) -> MeshResult<Arc<dyn DynTest>> {
    tests
        .get(name)
        .ok_or_else(|| meshsuite_core::MeshError::UnknownTest {
            test_name: name.to_string(),
        })
}
