//! Registration with the API container and the flows it can request.

mod executor;
mod options;
mod registration;

pub use executor::{TestSuiteConfigurator, TestSuiteExecutor};
pub use options::{ExecutorOptions, DEFAULT_LISTEN_ADDR};
pub use registration::{
    dispatch, register_suite, run_metadata_serialization_flow, run_test_execution_flow, RetryPolicy,
};
