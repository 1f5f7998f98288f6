//! Shared fixtures: a recording backend, a recording clock and scripted tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use meshsuite::rpc::{
    ExecCommandArgs, ExecCommandResponse, PortBinding, RegisterServiceArgs, RegisterServiceResponse,
    RegisterTestExecutionArgs, RemoveServiceArgs, RepartitionArgs, StartServiceArgs,
    StartServiceResponse, SuiteRegistrationResponse, TestExecutionInfo, TestSuiteMetadata,
    WaitForEndpointAvailabilityArgs,
};
use meshsuite::{
    ApiContainerClient, ContainerCreationConfig, ContainerRunConfig, MeshError, MeshResult,
    NetworkContext, ServiceContext, ServiceId, Test, TestConfiguration, TestError, TestRegistry,
    TestResult, TestSuite, TimeProvider,
};

/// Backend double recording every call by name.
pub struct MockBackend {
    calls: Mutex<Vec<String>>,
    registration_failures: AtomicU32,
    next_ip: AtomicU32,
    pub suite_action: Mutex<String>,
    pub test_name: Mutex<String>,
    pub fail_start: Mutex<bool>,
    pub started: Mutex<Vec<StartServiceArgs>>,
    pub repartitions: Mutex<Vec<RepartitionArgs>>,
    pub metadata: Mutex<Option<TestSuiteMetadata>>,
    pub execution_timeouts: Mutex<Vec<u32>>,
    pub stop_timeouts: Mutex<Vec<u64>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            registration_failures: AtomicU32::new(0),
            next_ip: AtomicU32::new(2),
            suite_action: Mutex::new("EXECUTE_TEST".to_string()),
            test_name: Mutex::new(String::new()),
            fail_start: Mutex::new(false),
            started: Mutex::new(Vec::new()),
            repartitions: Mutex::new(Vec::new()),
            metadata: Mutex::new(None),
            execution_timeouts: Mutex::new(Vec::new()),
            stop_timeouts: Mutex::new(Vec::new()),
        })
    }

    /// Fail the next `count` suite registrations.
    pub fn fail_registrations(&self, count: u32) {
        self.registration_failures.store(count, Ordering::SeqCst);
    }

    pub fn set_suite_action(&self, action: &str) {
        *self.suite_action.lock().unwrap() = action.to_string();
    }

    pub fn set_test_name(&self, name: &str) {
        *self.test_name.lock().unwrap() = name.to_string();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait]
impl ApiContainerClient for MockBackend {
    async fn register_suite(&self) -> MeshResult<SuiteRegistrationResponse> {
        self.record("register_suite");
        let remaining = self.registration_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.registration_failures
                .store(remaining - 1, Ordering::SeqCst);
            return Err(MeshError::backend("register suite", "connection refused"));
        }
        Ok(SuiteRegistrationResponse {
            suite_action: self.suite_action.lock().unwrap().clone(),
        })
    }

    async fn serialize_suite_metadata(&self, metadata: TestSuiteMetadata) -> MeshResult<()> {
        self.record("serialize_suite_metadata");
        *self.metadata.lock().unwrap() = Some(metadata);
        Ok(())
    }

    async fn get_test_execution_info(&self) -> MeshResult<TestExecutionInfo> {
        self.record("get_test_execution_info");
        Ok(TestExecutionInfo {
            test_name: self.test_name.lock().unwrap().clone(),
        })
    }

    async fn register_test_setup(&self) -> MeshResult<()> {
        self.record("register_test_setup");
        Ok(())
    }

    async fn register_test_setup_completion(&self) -> MeshResult<()> {
        self.record("register_test_setup_completion");
        Ok(())
    }

    async fn register_test_execution(&self, args: RegisterTestExecutionArgs) -> MeshResult<()> {
        self.record("register_test_execution");
        self.execution_timeouts
            .lock()
            .unwrap()
            .push(args.timeout_seconds);
        Ok(())
    }

    async fn register_service(
        &self,
        args: RegisterServiceArgs,
    ) -> MeshResult<RegisterServiceResponse> {
        self.record("register_service");
        let ip = self.next_ip.fetch_add(1, Ordering::SeqCst);
        Ok(RegisterServiceResponse {
            generated_files_relative_filepaths: args
                .files_to_generate
                .iter()
                .map(|key| (key.clone(), format!("{}/{}", args.service_id, key)))
                .collect(),
            static_files_relative_filepaths: args
                .static_files
                .iter()
                .map(|id| (id.clone(), format!("static/{id}")))
                .collect(),
            ip_addr: format!("172.23.0.{ip}"),
        })
    }

    async fn start_service(&self, args: StartServiceArgs) -> MeshResult<StartServiceResponse> {
        self.record("start_service");
        if *self.fail_start.lock().unwrap() {
            return Err(MeshError::backend(
                format!("start service (service '{}')", args.service_id),
                "image not found",
            ));
        }
        let bindings = args
            .used_ports
            .iter()
            .enumerate()
            .map(|(i, port)| {
                (
                    port.clone(),
                    PortBinding {
                        interface_ip: "127.0.0.1".to_string(),
                        interface_port: (32000 + i).to_string(),
                    },
                )
            })
            .collect::<HashMap<_, _>>();
        self.started.lock().unwrap().push(args);
        Ok(StartServiceResponse {
            used_ports_host_port_bindings: bindings,
        })
    }

    async fn remove_service(&self, args: RemoveServiceArgs) -> MeshResult<()> {
        self.record("remove_service");
        self.stop_timeouts
            .lock()
            .unwrap()
            .push(args.container_stop_timeout_seconds);
        Ok(())
    }

    async fn repartition(&self, args: RepartitionArgs) -> MeshResult<()> {
        self.record("repartition");
        self.repartitions.lock().unwrap().push(args);
        Ok(())
    }

    async fn exec_command(&self, args: ExecCommandArgs) -> MeshResult<ExecCommandResponse> {
        self.record("exec_command");
        let exit_code = if args.command_args.first().map(String::as_str) == Some("false") {
            1
        } else {
            0
        };
        Ok(ExecCommandResponse {
            exit_code,
            log_output: args.command_args.join(" "),
        })
    }

    async fn wait_for_endpoint_availability(
        &self,
        _args: WaitForEndpointAvailabilityArgs,
    ) -> MeshResult<()> {
        self.record("wait_for_endpoint_availability");
        Ok(())
    }
}

/// Clock that records sleeps instead of sleeping.
#[derive(Clone, Default)]
pub struct RecordingTime {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingTime {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl TimeProvider for RecordingTime {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }

    fn now(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

/// How a [`ScriptedTest`] behaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Script {
    Pass,
    FailSetup,
    PanicSetup,
    FailRun,
    PanicRun,
}

/// Test whose hooks follow a [`Script`] and log what ran.
pub struct ScriptedTest {
    pub name: &'static str,
    pub script: Script,
    pub log: Arc<Mutex<Vec<String>>>,
    pub config: TestConfiguration,
}

impl ScriptedTest {
    pub fn new(name: &'static str, script: Script, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name,
            script,
            log: Arc::clone(log),
            config: TestConfiguration::default(),
        }
    }

    fn note(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl Test for ScriptedTest {
    type Network = String;

    fn configuration(&self) -> TestConfiguration {
        self.config.clone()
    }

    async fn setup(&self, _network: NetworkContext) -> TestResult<String> {
        self.note(format!("setup:{}", self.name));
        match self.script {
            Script::FailSetup => Err(TestError::Assertion("setup refused".to_string())),
            Script::PanicSetup => panic!("setup exploded"),
            _ => Ok(format!("network-of-{}", self.name)),
        }
    }

    async fn run(&self, network: String) -> TestResult<()> {
        self.note(format!("run:{}:{}", self.name, network));
        match self.script {
            Script::FailRun => Err(TestError::Assertion("run refused".to_string())),
            Script::PanicRun => panic!("run exploded"),
            _ => Ok(()),
        }
    }
}

/// Test that starts one container in setup and execs into it in run.
pub struct ContainerTest;

#[async_trait]
impl Test for ContainerTest {
    type Network = ServiceContext;

    async fn setup(&self, network: NetworkContext) -> TestResult<ServiceContext> {
        let (service, _) = network
            .add_service(
                ServiceId::new("box"),
                ContainerCreationConfig::new("alpine:3.12"),
                |_, _, _| {
                    Ok(ContainerRunConfig {
                        cmd_override: Some(vec!["sleep".to_string(), "999999".to_string()]),
                        ..ContainerRunConfig::default()
                    })
                },
            )
            .await?;
        Ok(service)
    }

    async fn run(&self, service: ServiceContext) -> TestResult<()> {
        let output = service.exec_command(["echo", "hello"]).await?;
        meshsuite::ensure(output.is_success(), "echo should succeed")?;
        meshsuite::ensure(output.log_output == "echo hello", "unexpected output")
    }
}

/// Suite over a fixed registry.
pub struct FixtureSuite {
    pub tests: TestRegistry,
}

impl TestSuite for FixtureSuite {
    fn tests(&self) -> TestRegistry {
        self.tests.clone()
    }

    fn network_width_bits(&self) -> u32 {
        8
    }
}

pub fn new_log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().unwrap().clone()
}
