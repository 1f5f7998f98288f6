//! Per-test configuration.

use std::collections::HashMap;

use crate::ids::FilesArtifactId;

/// Default setup timeout, in seconds.
pub const DEFAULT_SETUP_TIMEOUT_SECONDS: u32 = 180;

/// Default run timeout, in seconds.
pub const DEFAULT_RUN_TIMEOUT_SECONDS: u32 = 180;

/// Declared requirements of a single test.
///
/// The backend enforces the timeouts; this process only reports them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestConfiguration {
    setup_timeout_seconds: u32,
    run_timeout_seconds: u32,
    is_partitioning_enabled: bool,
    files_artifact_urls: HashMap<FilesArtifactId, String>,
}

impl TestConfiguration {
    /// Start building a configuration from the defaults.
    pub fn builder() -> TestConfigurationBuilder {
        TestConfigurationBuilder::new()
    }

    /// Seconds the backend allows for `setup`.
    pub fn setup_timeout_seconds(&self) -> u32 {
        self.setup_timeout_seconds
    }

    /// Seconds the backend allows for `run`.
    pub fn run_timeout_seconds(&self) -> u32 {
        self.run_timeout_seconds
    }

    /// Whether the test may repartition its network.
    pub fn is_partitioning_enabled(&self) -> bool {
        self.is_partitioning_enabled
    }

    /// Files artifacts the test mounts into its services, by id.
    pub fn files_artifact_urls(&self) -> &HashMap<FilesArtifactId, String> {
        &self.files_artifact_urls
    }
}

impl Default for TestConfiguration {
    fn default() -> Self {
        TestConfigurationBuilder::new().build()
    }
}

/// Builder for [`TestConfiguration`].
#[derive(Debug, Clone)]
pub struct TestConfigurationBuilder {
    setup_timeout_seconds: u32,
    run_timeout_seconds: u32,
    is_partitioning_enabled: bool,
    files_artifact_urls: HashMap<FilesArtifactId, String>,
}

impl TestConfigurationBuilder {
    /// Builder holding the defaults.
    pub fn new() -> Self {
        Self {
            setup_timeout_seconds: DEFAULT_SETUP_TIMEOUT_SECONDS,
            run_timeout_seconds: DEFAULT_RUN_TIMEOUT_SECONDS,
            is_partitioning_enabled: false,
            files_artifact_urls: HashMap::new(),
        }
    }

    /// Set the setup timeout.
    pub fn setup_timeout_seconds(mut self, seconds: u32) -> Self {
        self.setup_timeout_seconds = seconds;
        self
    }

    /// Set the run timeout.
    pub fn run_timeout_seconds(mut self, seconds: u32) -> Self {
        self.run_timeout_seconds = seconds;
        self
    }

    /// Allow the test to repartition its network.
    pub fn partitioning_enabled(mut self, enabled: bool) -> Self {
        self.is_partitioning_enabled = enabled;
        self
    }

    /// Declare a files artifact.
    pub fn files_artifact(mut self, id: FilesArtifactId, url: impl Into<String>) -> Self {
        self.files_artifact_urls.insert(id, url.into());
        self
    }

    /// Freeze the configuration.
    pub fn build(self) -> TestConfiguration {
        TestConfiguration {
            setup_timeout_seconds: self.setup_timeout_seconds,
            run_timeout_seconds: self.run_timeout_seconds,
            is_partitioning_enabled: self.is_partitioning_enabled,
            files_artifact_urls: self.files_artifact_urls,
        }
    }
}

impl Default for TestConfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}
