//! # meshsuite
//!
//! Write tests against ephemeral multi-service container networks.
//!
//! A test suite process is launched by an API container (the orchestration
//! backend). It registers itself, then either reports its metadata or sets up
//! and runs the single test the backend asks for:
//!
//! ```text
//! ┌───────────────────────┐   registerSuite, registerService, ...   ┌───────────────┐
//! │  TestSuiteExecutor    │ ───────────────────────────────────────▶│ API container │
//! │  TestSuiteService     │ ◀───────────────────────────────────────│               │
//! │  NetworkContext       │        setupTest, runTest, ...          └───────────────┘
//! └───────────────────────┘
//! ```
//!
//! ## Writing a suite
//!
//! - Implement [`Test`] for each test and collect them in a [`TestRegistry`]
//! - Implement [`TestSuite`] to expose the registry
//! - Implement [`TestSuiteConfigurator`] to build the suite from its JSON parameters
//! - Hand the configurator to [`TestSuiteExecutor`] in `main`
//!
//! ## Modules
//!
//! - [`backend`]: client for the API container
//! - [`network`]: [`NetworkContext`] and [`ServiceContext`]
//! - [`lifecycle`]: the setup/run state machine
//! - [`server`]: the JSON-RPC server exposing the state machine
//! - [`execution`]: registration, dispatch and process options

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

pub mod backend;
pub mod execution;
pub mod lifecycle;
pub mod logging;
pub mod network;
pub mod server;
pub mod testsuite;

pub use backend::{ApiContainerClient, JsonRpcApiContainerClient};
pub use execution::{ExecutorOptions, RetryPolicy, TestSuiteConfigurator, TestSuiteExecutor};
pub use lifecycle::{LifecyclePhase, TestSuiteService};
pub use network::{EndpointCheck, ExecOutput, HostPortBindings, NetworkContext, ServiceContext};
pub use server::TestSuiteServer;
pub use testsuite::{Test, TestRegistry, TestSuite};

pub use meshsuite_core::*;
pub use meshsuite_rpc as rpc;
