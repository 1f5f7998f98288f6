//! Error types shared by every meshsuite crate.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::ids::{FilesArtifactId, PartitionId, ServiceId, StaticFileId};

/// Result alias for framework operations.
pub type MeshResult<T> = Result<T, MeshError>;

/// Result alias for test `setup`/`run` bodies.
pub type TestResult<T> = Result<T, TestError>;

/// Lifecycle phase a test fault happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPhase {
    /// The test's `setup` hook.
    Setup,
    /// The test's `run` hook.
    Run,
}

impl fmt::Display for TestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup => f.write_str("setup"),
            Self::Run => f.write_str("run"),
        }
    }
}

/// Step of adding a service that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddServiceStep {
    /// Registering the service with the backend.
    Register,
    /// Writing the generated files into the execution volume.
    GenerateFiles,
    /// Resolving static file paths.
    ResolveStaticFiles,
    /// Resolving files artifact URLs.
    ResolveArtifacts,
    /// Calling the run config factory.
    BuildRunConfig,
    /// Starting the container.
    Start,
}

impl fmt::Display for AddServiceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            Self::Register => "register",
            Self::GenerateFiles => "generate files",
            Self::ResolveStaticFiles => "resolve static files",
            Self::ResolveArtifacts => "resolve files artifacts",
            Self::BuildRunConfig => "build run config",
            Self::Start => "start",
        };
        f.write_str(step)
    }
}

/// Coarse classification of a [`MeshError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Backend unreachable after the retry budget.
    Transient,
    /// Contract breach between controller, backend and test author.
    ProtocolViolation,
    /// Calls made in the wrong order.
    Ordering,
    /// Assertion failure or fault inside a test body.
    TestFault,
    /// Bad configuration discovered at startup or during setup.
    Configuration,
    /// The backend reported a failure.
    Backend,
    /// Anything else: I/O, server, interruption.
    Internal,
}

/// Errors produced by the test-suite driver.
#[derive(Debug, Error)]
pub enum MeshError {
    /// Registration with the backend never succeeded.
    #[error("registration failed after {attempts} attempts {interval:?} apart: {last_error}")]
    RegistrationExhausted {
        /// Attempts made.
        attempts: u32,
        /// Delay between attempts.
        interval: Duration,
        /// Error of the last attempt.
        last_error: String,
    },

    /// The backend asked for an action this process does not know.
    #[error("unrecognized suite action '{action}'")]
    UnrecognizedSuiteAction {
        /// Raw action value.
        action: String,
    },

    /// A test name unknown to the suite was requested.
    #[error("no test named '{test_name}' exists in the test suite")]
    UnknownTest {
        /// Requested test.
        test_name: String,
    },

    /// `run_test` was called without a successful `setup_test`.
    #[error("cannot run a test before one has been set up")]
    RunBeforeSetup,

    /// An operation needs the backend client but the process is in metadata-only mode.
    #[error("cannot {operation}: no API container client is configured (metadata-only mode)")]
    NoBackendClient {
        /// What was attempted.
        operation: &'static str,
    },

    /// A test hook returned an error.
    #[error("test '{test_name}' failed during {phase}: {source}")]
    TestFailed {
        /// Failing test.
        test_name: String,
        /// Hook that failed.
        phase: TestPhase,
        /// Error returned by the hook.
        #[source]
        source: Box<TestError>,
    },

    /// A test hook panicked.
    #[error("test '{test_name}' panicked during {phase}: {message}")]
    TestPanicked {
        /// Failing test.
        test_name: String,
        /// Hook that panicked.
        phase: TestPhase,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// Invalid configuration value.
    #[error("invalid configuration for '{key}': {message}")]
    Configuration {
        /// Offending key.
        key: String,
        /// What is wrong with its value.
        message: String,
    },

    /// A generated file key was requested but the backend never produced a path for it.
    #[error("no generated file path exists for key '{key}'")]
    MissingGeneratedFile {
        /// Requested key.
        key: String,
    },

    /// A static file key was requested but not declared.
    #[error("no static file path exists for key '{static_file_id}'")]
    UnknownStaticFile {
        /// Requested key.
        static_file_id: StaticFileId,
    },

    /// A files artifact was mounted but the test never declared its URL.
    #[error("no files artifact URL was declared for artifact '{artifact_id}'")]
    UnknownFilesArtifact {
        /// Requested artifact.
        artifact_id: FilesArtifactId,
    },

    /// A file generator failed.
    #[error("generating file '{key}' failed: {message}")]
    FileGeneration {
        /// Generated file key.
        key: String,
        /// Generator error.
        message: String,
    },

    /// A service id was added twice.
    #[error("service '{service_id}' already exists in the network")]
    DuplicateService {
        /// Offending id.
        service_id: ServiceId,
    },

    /// A service id is not part of the network.
    #[error("no service '{service_id}' exists in the network")]
    UnknownService {
        /// Requested id.
        service_id: ServiceId,
    },

    /// Repartitioning was requested on a test that did not enable it.
    #[error("cannot repartition the network: partitioning is not enabled for this test")]
    PartitioningDisabled,

    /// A partition definition is malformed.
    #[error("invalid partition '{partition_id}': {reason}")]
    InvalidPartition {
        /// Offending partition.
        partition_id: PartitionId,
        /// What is wrong with it.
        reason: String,
    },

    /// A partition names a service that was never added.
    #[error("partition '{partition_id}' references service '{service_id}' which was never added")]
    UnknownPartitionMember {
        /// Partition holding the member.
        partition_id: PartitionId,
        /// The unregistered service.
        service_id: ServiceId,
    },

    /// The availability poller gave up.
    #[error("service '{service_id}' unavailable after {attempts} attempts {interval:?} apart")]
    ServiceUnavailable {
        /// Service being polled.
        service_id: ServiceId,
        /// Predicate evaluations made.
        attempts: u32,
        /// Delay between evaluations.
        interval: Duration,
    },

    /// Adding a service failed at a specific step.
    #[error("adding service '{service_id}' failed at step '{step}': {source}")]
    AddService {
        /// Service being added.
        service_id: ServiceId,
        /// Step that failed.
        step: AddServiceStep,
        /// Underlying error.
        #[source]
        source: Box<MeshError>,
    },

    /// The backend reported an error.
    #[error("API container call '{operation}' failed: {message}")]
    Backend {
        /// Operation, including the service id where one applies.
        operation: String,
        /// Backend error message.
        message: String,
    },

    /// Filesystem error.
    #[error("{context}: {source}")]
    Io {
        /// What was being done.
        context: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The controller RPC server failed.
    #[error("test suite server error: {0}")]
    Server(String),

    /// A termination signal arrived before the flow finished.
    #[error("interrupted by a termination signal")]
    Interrupted,
}

impl MeshError {
    /// Backend error helper.
    pub fn backend(operation: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Configuration error helper.
    pub fn configuration(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            key: key.into(),
            message: message.into(),
        }
    }

    /// I/O error helper.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RegistrationExhausted { .. } => ErrorKind::Transient,
            Self::UnrecognizedSuiteAction { .. } | Self::UnknownTest { .. } => {
                ErrorKind::ProtocolViolation
            }
            Self::RunBeforeSetup | Self::NoBackendClient { .. } => ErrorKind::Ordering,
            Self::TestFailed { .. } | Self::TestPanicked { .. } => ErrorKind::TestFault,
            Self::Configuration { .. }
            | Self::MissingGeneratedFile { .. }
            | Self::UnknownStaticFile { .. }
            | Self::UnknownFilesArtifact { .. }
            | Self::FileGeneration { .. } => ErrorKind::Configuration,
            Self::DuplicateService { .. }
            | Self::UnknownService { .. }
            | Self::PartitioningDisabled
            | Self::InvalidPartition { .. }
            | Self::UnknownPartitionMember { .. }
            | Self::ServiceUnavailable { .. } => ErrorKind::TestFault,
            Self::AddService { source, .. } => source.kind(),
            Self::Backend { .. } => ErrorKind::Backend,
            Self::Io { .. } | Self::Server(_) | Self::Interrupted => ErrorKind::Internal,
        }
    }
}

/// Error returned by a test's `setup` or `run` hook.
#[derive(Debug, Error)]
pub enum TestError {
    /// A check inside the test did not hold.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// A network operation failed.
    #[error(transparent)]
    Network(#[from] MeshError),

    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

impl TestError {
    /// Any other failure, from a message.
    pub fn other(message: impl fmt::Display) -> Self {
        Self::Other(message.to_string())
    }
}

/// Fail the test with `message` unless `condition` holds.
///
/// ```
/// use meshsuite_core::{ensure, TestResult};
///
/// fn check(exit_code: i32) -> TestResult<()> {
///     ensure(exit_code == 0, format!("expected exit code 0, got {exit_code}"))
/// }
/// assert!(check(0).is_ok());
/// assert!(check(1).is_err());
/// ```
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult<()> {
    if condition {
        Ok(())
    } else {
        Err(TestError::Assertion(message.into()))
    }
}
