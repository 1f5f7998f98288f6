//! Example test suite.
//!
//! Launched by an API container, which passes its configuration through the
//! environment:
//!
//! ```bash
//! CUSTOM_PARAMS_JSON='{"alpineImage": "alpine:3.12"}' \
//! API_CONTAINER_SOCKET=172.23.0.2:7443 \
//! LOG_LEVEL=debug \
//! meshsuite-example
//! ```
//!
//! Without `API_CONTAINER_SOCKET` the suite only serves its metadata until it
//! is stopped.

mod suite;

use std::process::ExitCode;

use clap::Parser;
use meshsuite::{ExecutorOptions, TestSuiteExecutor};
use suite::ExampleConfigurator;

#[tokio::main]
async fn main() -> ExitCode {
    let options = ExecutorOptions::parse();

    let executor = TestSuiteExecutor::new(options, ExampleConfigurator);
    match executor.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "test suite executor failed");
            eprintln!("Error: {err}");
            let mut source = std::error::Error::source(&err);
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
