//! Suite registration and action dispatch.

use std::time::Duration;

use meshsuite_core::{MeshError, MeshResult, TimeProvider};
use meshsuite_rpc::{RegisterTestExecutionArgs, SuiteAction};
use tracing::{debug, info, warn};

use crate::backend::ApiContainerClient;
use crate::lifecycle::TestSuiteService;

/// How registration retries while the backend is not yet listening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            interval: Duration::from_millis(500),
        }
    }
}

/// Register the suite, retrying failed calls per `policy`.
///
/// Sleeps only between attempts: success on attempt `k` means `k - 1`
/// sleeps, exhaustion means `max_attempts - 1`.
pub async fn register_suite<T: TimeProvider>(
    client: &dyn ApiContainerClient,
    time: &T,
    policy: RetryPolicy,
) -> MeshResult<SuiteAction> {
    let mut last_error = String::from("no attempt was made");
    for attempt in 1..=policy.max_attempts {
        match client.register_suite().await {
            Ok(response) => {
                info!(attempt, action = %response.suite_action, "registered test suite");
                return SuiteAction::from_wire(&response.suite_action).ok_or(
                    MeshError::UnrecognizedSuiteAction {
                        action: response.suite_action,
                    },
                );
            }
            Err(err) => {
                debug!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "suite registration failed"
                );
                last_error = err.to_string();
            }
        }
        if attempt < policy.max_attempts {
            time.sleep(policy.interval).await;
        }
    }
    warn!(
        attempts = policy.max_attempts,
        interval = ?policy.interval,
        "giving up on suite registration"
    );
    Err(MeshError::RegistrationExhausted {
        attempts: policy.max_attempts,
        interval: policy.interval,
        last_error,
    })
}

/// Push the suite metadata to the backend.
pub async fn run_metadata_serialization_flow(
    client: &dyn ApiContainerClient,
    service: &TestSuiteService,
) -> MeshResult<()> {
    let metadata = service.get_test_suite_metadata();
    info!(
        tests = metadata.test_metadata.len(),
        "serializing test suite metadata"
    );
    client.serialize_suite_metadata(metadata).await
}

/// Set up and run the test the backend asks for.
pub async fn run_test_execution_flow(
    client: &dyn ApiContainerClient,
    service: &TestSuiteService,
) -> MeshResult<()> {
    let test_name = client.get_test_execution_info().await?.test_name;
    let config = service
        .tests()
        .configuration(&test_name)
        .ok_or_else(|| MeshError::UnknownTest {
            test_name: test_name.clone(),
        })?;
    info!(test_name = %test_name, "executing test");

    client.register_test_setup().await?;
    service.setup_test(&test_name).await?;
    client.register_test_setup_completion().await?;

    client
        .register_test_execution(RegisterTestExecutionArgs {
            timeout_seconds: config.run_timeout_seconds(),
        })
        .await?;
    service.run_test().await
}

/// Run the flow matching `action`.
pub async fn dispatch(
    action: SuiteAction,
    client: &dyn ApiContainerClient,
    service: &TestSuiteService,
) -> MeshResult<()> {
    match action {
        SuiteAction::SerializeSuiteMetadata => {
            run_metadata_serialization_flow(client, service).await
        }
        SuiteAction::ExecuteTest => run_test_execution_flow(client, service).await,
    }
}
