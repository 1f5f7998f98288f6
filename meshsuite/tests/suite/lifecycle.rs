use std::sync::Arc;

use meshsuite::{ErrorKind, LifecyclePhase, MeshError, TestPhase, TestRegistry, TestSuiteService};

use crate::common::{
    entries, new_log, ContainerTest, FixtureSuite, MockBackend, Script, ScriptedTest,
};

fn service_with(tests: TestRegistry, backend: &Arc<MockBackend>) -> TestSuiteService {
    let dir = std::env::temp_dir();
    let client: Arc<dyn meshsuite::ApiContainerClient> = backend.clone();
    TestSuiteService::new(&FixtureSuite { tests }, Some(client), dir)
}

#[tokio::test]
async fn run_before_setup_is_an_ordering_error() {
    let log = new_log();
    let backend = MockBackend::new();
    let service = service_with(
        TestRegistry::new().test("only", ScriptedTest::new("only", Script::Pass, &log)),
        &backend,
    );

    let err = service.run_test().await.expect_err("nothing was set up");

    assert!(matches!(err, MeshError::RunBeforeSetup));
    assert_eq!(err.kind(), ErrorKind::Ordering);
    assert!(entries(&log).is_empty(), "run hook must not be invoked");
    assert_eq!(service.phase().await, LifecyclePhase::Idle);
}

#[tokio::test]
async fn setup_then_run_drives_the_network() {
    let backend = MockBackend::new();
    let tests = TestRegistry::new().test("container", ContainerTest);
    let service = service_with(tests, &backend);

    service.setup_test("container").await.expect("setup runs");
    assert_eq!(
        service.phase().await,
        LifecyclePhase::Ready {
            test_name: "container".to_string()
        }
    );

    service.run_test().await.expect("run succeeds");
    assert_eq!(service.phase().await, LifecyclePhase::Idle);
    assert_eq!(
        backend.calls(),
        vec!["register_service", "start_service", "exec_command"]
    );
}

#[tokio::test]
async fn setup_needs_a_backend_client() {
    let log = new_log();
    let suite = FixtureSuite {
        tests: TestRegistry::new().test("only", ScriptedTest::new("only", Script::Pass, &log)),
    };
    let service = TestSuiteService::new(&suite, None, std::env::temp_dir());

    let err = service.setup_test("only").await.expect_err("no backend");
    assert!(matches!(err, MeshError::NoBackendClient { .. }));
    assert!(entries(&log).is_empty());
}

#[tokio::test]
async fn unknown_test_is_a_protocol_violation() {
    let backend = MockBackend::new();
    let service = service_with(TestRegistry::new(), &backend);

    let err = service.setup_test("missing").await.expect_err("unknown");
    assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
    assert!(err.to_string().contains("'missing'"));
}

#[tokio::test]
async fn failing_setup_is_reported_and_blocks_run() {
    let log = new_log();
    let backend = MockBackend::new();
    let service = service_with(
        TestRegistry::new().test("bad", ScriptedTest::new("bad", Script::FailSetup, &log)),
        &backend,
    );

    let err = service.setup_test("bad").await.expect_err("setup fails");
    assert!(matches!(
        err,
        MeshError::TestFailed {
            phase: TestPhase::Setup,
            ..
        }
    ));
    assert!(matches!(service.phase().await, LifecyclePhase::Failed { .. }));

    let err = service.run_test().await.expect_err("nothing to run");
    assert!(matches!(err, MeshError::RunBeforeSetup));
    assert_eq!(entries(&log), vec!["setup:bad"]);
}

#[tokio::test]
async fn panicking_setup_is_isolated() {
    let log = new_log();
    let backend = MockBackend::new();
    let service = service_with(
        TestRegistry::new().test("pop", ScriptedTest::new("pop", Script::PanicSetup, &log)),
        &backend,
    );

    let err = service.setup_test("pop").await.expect_err("setup panics");
    match err {
        MeshError::TestPanicked { phase, message, .. } => {
            assert_eq!(phase, TestPhase::Setup);
            assert_eq!(message, "setup exploded");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(service.is_available());
}

#[tokio::test]
async fn panicking_run_is_isolated() {
    let log = new_log();
    let backend = MockBackend::new();
    let service = service_with(
        TestRegistry::new()
            .test("boom", ScriptedTest::new("boom", Script::PanicRun, &log))
            .test("fine", ScriptedTest::new("fine", Script::Pass, &log)),
        &backend,
    );

    service.setup_test("boom").await.expect("setup succeeds");
    let err = service.run_test().await.expect_err("run panics");
    match &err {
        MeshError::TestPanicked {
            test_name,
            phase,
            message,
        } => {
            assert_eq!(test_name, "boom");
            assert_eq!(*phase, TestPhase::Run);
            assert_eq!(message, "run exploded");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.kind(), ErrorKind::TestFault);
    assert!(service.is_available());

    service.setup_test("fine").await.expect("still usable");
    service.run_test().await.expect("next test runs");
}

#[tokio::test]
async fn failing_run_returns_the_test_error() {
    let log = new_log();
    let backend = MockBackend::new();
    let service = service_with(
        TestRegistry::new().test("sad", ScriptedTest::new("sad", Script::FailRun, &log)),
        &backend,
    );

    service.setup_test("sad").await.expect("setup succeeds");
    let err = service.run_test().await.expect_err("run fails");
    assert!(err.to_string().contains("run refused"));
    assert_eq!(
        service.phase().await,
        LifecyclePhase::Failed {
            test_name: "sad".to_string(),
            reason: err.to_string(),
        }
    );
}

#[tokio::test]
async fn second_setup_overwrites_the_first() {
    let log = new_log();
    let backend = MockBackend::new();
    let service = service_with(
        TestRegistry::new()
            .test("first", ScriptedTest::new("first", Script::Pass, &log))
            .test("second", ScriptedTest::new("second", Script::Pass, &log)),
        &backend,
    );

    service.setup_test("first").await.expect("first setup");
    service.setup_test("second").await.expect("second setup");
    service.run_test().await.expect("run");

    assert_eq!(
        entries(&log),
        vec!["setup:first", "setup:second", "run:second:network-of-second"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_setup_and_run_observe_whole_states() {
    for _ in 0..20 {
        let log = new_log();
        let backend = MockBackend::new();
        let service = Arc::new(service_with(
            TestRegistry::new()
                .test("first", ScriptedTest::new("first", Script::Pass, &log))
                .test("second", ScriptedTest::new("second", Script::Pass, &log)),
            &backend,
        ));
        service.setup_test("first").await.expect("first setup");

        let setup = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.setup_test("second").await })
        };
        let run = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.run_test().await })
        };
        setup.await.expect("join").expect("second setup");
        run.await.expect("join").expect("run");

        let runs: Vec<String> = entries(&log)
            .into_iter()
            .filter(|entry| entry.starts_with("run:"))
            .collect();
        match runs.as_slice() {
            [only] if only == "run:first:network-of-first" => {
                assert_eq!(
                    service.phase().await,
                    LifecyclePhase::Ready {
                        test_name: "second".to_string()
                    }
                );
            }
            [only] if only == "run:second:network-of-second" => {
                assert_eq!(service.phase().await, LifecyclePhase::Idle);
            }
            other => panic!("unexpected runs: {other:?}"),
        }
    }
}
