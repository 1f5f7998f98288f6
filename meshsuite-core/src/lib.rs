//! # meshsuite-core
//!
//! Core types for driving a containerized test network.
//!
//! - **Identifiers**: [`ServiceId`], [`PartitionId`], [`StaticFileId`], [`FilesArtifactId`]
//! - **Errors**: [`MeshError`] for the driver, [`TestError`] for test bodies
//! - **Partition model**: [`RepartitionerBuilder`] and [`Repartitioner`]
//! - **Availability polling**: [`AvailabilityChecker`]
//! - **Configuration**: [`TestConfiguration`], [`ContainerCreationConfig`], [`ContainerRunConfig`]
//! - **Time**: [`TimeProvider`] so retry loops can be tested without sleeping

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod availability;
mod config;
mod container;
mod error;
mod ids;
mod partition;
mod time;

pub use availability::{AvailabilityChecker, Service};
pub use config::{
    TestConfiguration, TestConfigurationBuilder, DEFAULT_RUN_TIMEOUT_SECONDS,
    DEFAULT_SETUP_TIMEOUT_SECONDS,
};
pub use container::{
    ContainerCreationConfig, ContainerRunConfig, FileGenerator, GeneratedFilePaths, GeneratorError,
    StaticFilePaths, DEFAULT_TEST_VOLUME_MOUNTPOINT,
};
pub use error::{
    ensure, AddServiceStep, ErrorKind, MeshError, MeshResult, TestError, TestPhase, TestResult,
};
pub use ids::{FilesArtifactId, PartitionId, ServiceId, StaticFileId};
pub use partition::{
    PartitionConnectionInfo, PartitionConnections, Repartitioner, RepartitionerBuilder,
};
pub use time::{TimeProvider, TokioTimeProvider};
