//! # meshsuite-rpc
//!
//! JSON-RPC definitions shared by the test suite and the API container.
//!
//! - [`api_container`]: calls the test suite makes to the backend
//! - [`test_suite`]: calls the backend makes to the test suite
//!
//! Both traits are declared with `jsonrpsee`'s `#[rpc]` macro, which generates
//! a `*Client` extension trait for any jsonrpsee client and a `*Server` trait
//! to implement when serving.

#![deny(clippy::unwrap_used)]

pub mod api_container;
pub mod error;
pub mod test_suite;

pub use api_container::{
    ApiContainerApiClient, ApiContainerApiServer, ExecCommandArgs, ExecCommandResponse, PortBinding,
    RegisterServiceArgs, RegisterServiceResponse, RegisterTestExecutionArgs, RemoveServiceArgs,
    RepartitionArgs, StartServiceArgs, StartServiceResponse, SuiteAction, SuiteRegistrationResponse,
    TestExecutionInfo, WaitForEndpointAvailabilityArgs,
};
pub use test_suite::{
    CopyStaticFilesArgs, SetupTestArgs, TestMetadata, TestSuiteApiClient, TestSuiteApiServer,
    TestSuiteMetadata,
};
