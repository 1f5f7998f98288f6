//! Setup/run state machine driven by the API container.
//!
//! ```text
//! Idle ──setup_test ok──▶ Ready ──run_test──▶ Idle | Failed
//!   ▲                       │
//!   └──── setup_test err ───┴──▶ Failed
//! ```
//!
//! One mutex guards the state and is held for the whole of `setup_test` and
//! `run_test`, so concurrent calls are serialized and never observe a
//! half-written state. Test hooks run on their own task: a panic inside them
//! is reported as [`MeshError::TestPanicked`] and leaves this process serving.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use meshsuite_core::{MeshError, MeshResult, StaticFileId, TestPhase, TestResult};
use meshsuite_rpc::TestSuiteMetadata;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::backend::ApiContainerClient;
use crate::network::NetworkContext;
use crate::testsuite::{self, PreparedTest, TestRegistry, TestSuite};

/// Default location of the suite execution volume in this process.
pub const DEFAULT_SUITE_EXECUTION_VOLUME: &str = "/suite-execution";

/// Observable tag of the lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Nothing set up.
    Idle,
    /// A test is set up and waiting for `run_test`.
    Ready {
        /// Test that was set up.
        test_name: String,
    },
    /// The last setup or run failed.
    Failed {
        /// Test that failed.
        test_name: String,
        /// Why.
        reason: String,
    },
}

/// State handed from `setup_test` to `run_test`.
struct TestSetupInfo {
    test_name: String,
    prepared: Box<dyn PreparedTest>,
}

enum LifecycleState {
    Idle,
    SetupDone(TestSetupInfo),
    Failed { test_name: String, reason: String },
}

impl LifecycleState {
    fn phase(&self) -> LifecyclePhase {
        match self {
            Self::Idle => LifecyclePhase::Idle,
            Self::SetupDone(info) => LifecyclePhase::Ready {
                test_name: info.test_name.clone(),
            },
            Self::Failed { test_name, reason } => LifecyclePhase::Failed {
                test_name: test_name.clone(),
                reason: reason.clone(),
            },
        }
    }
}

/// Serves setup and run requests for the tests of one suite.
pub struct TestSuiteService {
    tests: TestRegistry,
    network_width_bits: u32,
    static_files: HashMap<StaticFileId, PathBuf>,
    client: Option<Arc<dyn ApiContainerClient>>,
    suite_execution_volume: PathBuf,
    state: Mutex<LifecycleState>,
}

impl TestSuiteService {
    /// Service for `suite`. Without `client` only metadata queries work.
    pub fn new(
        suite: &dyn TestSuite,
        client: Option<Arc<dyn ApiContainerClient>>,
        suite_execution_volume: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tests: suite.tests(),
            network_width_bits: suite.network_width_bits(),
            static_files: suite.static_files(),
            client,
            suite_execution_volume: suite_execution_volume.into(),
            state: Mutex::new(LifecycleState::Idle),
        }
    }

    /// Liveness probe.
    pub fn is_available(&self) -> bool {
        true
    }

    /// Tests of the suite.
    pub fn tests(&self) -> &TestRegistry {
        &self.tests
    }

    /// Metadata of every test; runs no test code.
    pub fn get_test_suite_metadata(&self) -> TestSuiteMetadata {
        testsuite::suite_metadata(&self.tests, self.network_width_bits, &self.static_files)
    }

    /// Current lifecycle phase.
    pub async fn phase(&self) -> LifecyclePhase {
        self.state.lock().await.phase()
    }

    /// Build the network of `test_name` and keep it for [`run_test`](Self::run_test).
    ///
    /// A second call replaces whatever the first one set up.
    pub async fn setup_test(&self, test_name: &str) -> MeshResult<()> {
        let mut state = self.state.lock().await;

        let client = self.client.clone().ok_or(MeshError::NoBackendClient {
            operation: "set up a test",
        })?;
        let test = testsuite::resolve(&self.tests, test_name)?;
        let config = test.configuration();
        let network = NetworkContext::new(
            client,
            config.files_artifact_urls().clone(),
            self.suite_execution_volume.clone(),
            config.is_partitioning_enabled(),
        );

        info!(test_name, "setting up test");
        let hook = async move { test.setup(network).await };
        let outcome = isolate(test_name, TestPhase::Setup, hook).await;
        match outcome {
            Ok(prepared) => {
                info!(test_name, "test setup complete");
                *state = LifecycleState::SetupDone(TestSetupInfo {
                    test_name: test_name.to_string(),
                    prepared,
                });
                Ok(())
            }
            Err(err) => {
                error!(test_name, error = %err, "test setup failed");
                *state = LifecycleState::Failed {
                    test_name: test_name.to_string(),
                    reason: err.to_string(),
                };
                Err(err)
            }
        }
    }

    /// Run the test set up by the last successful [`setup_test`](Self::setup_test).
    pub async fn run_test(&self) -> MeshResult<()> {
        let mut state = self.state.lock().await;

        let info = match std::mem::replace(&mut *state, LifecycleState::Idle) {
            LifecycleState::SetupDone(info) => info,
            previous => {
                *state = previous;
                warn!("run requested before any test was set up");
                return Err(MeshError::RunBeforeSetup);
            }
        };
        let TestSetupInfo {
            test_name,
            prepared,
        } = info;
        testsuite::resolve(&self.tests, &test_name)?;

        info!(test_name = %test_name, "running test");
        let outcome = isolate(&test_name, TestPhase::Run, prepared.run()).await;
        match outcome {
            Ok(()) => {
                info!(test_name = %test_name, "test passed");
                Ok(())
            }
            Err(err) => {
                error!(test_name = %test_name, error = %err, "test failed");
                *state = LifecycleState::Failed {
                    test_name,
                    reason: err.to_string(),
                };
                Err(err)
            }
        }
    }

    /// Copy the suite's static files into the execution volume.
    ///
    /// `destinations` maps each static file to a path relative to the volume.
    /// Every entry is resolved and its source checked before anything is
    /// copied, so a rejected request leaves the volume untouched.
    pub async fn copy_static_files_to_execution_volume(
        &self,
        destinations: &HashMap<StaticFileId, String>,
    ) -> MeshResult<()> {
        let mut copies = Vec::with_capacity(destinations.len());
        for (static_file_id, relative) in destinations {
            let source = self
                .static_files
                .get(static_file_id)
                .ok_or_else(|| MeshError::UnknownStaticFile {
                    static_file_id: static_file_id.clone(),
                })?;
            tokio::fs::metadata(source).await.map_err(|e| {
                MeshError::io(
                    format!(
                        "reading static file '{static_file_id}' at {}",
                        source.display()
                    ),
                    e,
                )
            })?;
            let destination = self.suite_execution_volume.join(relative);
            copies.push((static_file_id, source, destination));
        }

        for (static_file_id, source, destination) in &copies {
            if let Some(parent) = destination.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    MeshError::io(format!("creating directory {}", parent.display()), e)
                })?;
            }
            tokio::fs::copy(source, destination).await.map_err(|e| {
                MeshError::io(
                    format!(
                        "copying static file '{static_file_id}' from {} to {}",
                        source.display(),
                        destination.display()
                    ),
                    e,
                )
            })?;
        }
        info!(
            count = copies.len(),
            "copied static files to the suite execution volume"
        );
        Ok(())
    }
}

/// Run a test hook on its own task, turning its error or panic into a [`MeshError`].
async fn isolate<T, F>(test_name: &str, phase: TestPhase, hook: F) -> MeshResult<T>
where
    T: Send + 'static,
    F: Future<Output = TestResult<T>> + Send + 'static,
{
    match tokio::spawn(hook).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(MeshError::TestFailed {
            test_name: test_name.to_string(),
            phase,
            source: Box::new(source),
        }),
        Err(join_error) if join_error.is_panic() => Err(MeshError::TestPanicked {
            test_name: test_name.to_string(),
            phase,
            message: panic_message(join_error.into_panic()),
        }),
        Err(join_error) => Err(MeshError::TestPanicked {
            test_name: test_name.to_string(),
            phase,
            message: join_error.to_string(),
        }),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
