use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use meshsuite::{
    AddServiceStep, ApiContainerClient, ContainerCreationConfig, ContainerRunConfig, EndpointCheck,
    FilesArtifactId, GeneratorError, MeshError, NetworkContext, PartitionConnectionInfo,
    PartitionId, ServiceId, StaticFileId,
};
use tempfile::TempDir;

use crate::common::MockBackend;

fn network(backend: &Arc<MockBackend>, dir: &TempDir, partitioning: bool) -> NetworkContext {
    let client: Arc<dyn ApiContainerClient> = backend.clone();
    NetworkContext::new(
        client,
        HashMap::from([(
            FilesArtifactId::new("dataset"),
            "https://artifacts.example.com/dataset.tgz".to_string(),
        )]),
        dir.path(),
        partitioning,
    )
}

fn plain(image: &str) -> ContainerCreationConfig {
    ContainerCreationConfig::new(image)
}

async fn add_plain(network: &NetworkContext, id: &str) {
    network
        .add_service(ServiceId::new(id), plain("alpine:3.12"), |_, _, _| {
            Ok(ContainerRunConfig::default())
        })
        .await
        .expect("service added");
}

#[tokio::test]
async fn add_service_generates_files_then_starts() {
    let backend = MockBackend::new();
    let dir = TempDir::new().expect("tempdir");
    let network = network(&backend, &dir, false);

    let mut creation = ContainerCreationConfig {
        used_ports: BTreeSet::from(["8080/tcp".to_string()]),
        files_artifact_mountpoints: HashMap::from([(
            FilesArtifactId::new("dataset"),
            "/data".into(),
        )]),
        static_files: BTreeSet::from([StaticFileId::new("schema")]),
        ..plain("kv-store:1.0")
    };
    creation.file_generators.insert(
        "config".to_string(),
        Box::new(|file: &mut std::fs::File, ip: &str| -> Result<(), GeneratorError> {
            write!(file, "listen={ip}")?;
            Ok(())
        }),
    );

    let (service, bindings) = network
        .add_service(ServiceId::new("kv"), creation, |ip, generated, statics| {
            let schema = statics.get(&StaticFileId::new("schema"))?;
            Ok(ContainerRunConfig {
                cmd_override: Some(vec![
                    "--config".to_string(),
                    generated.get("config")?.display().to_string(),
                    "--schema".to_string(),
                    schema.display().to_string(),
                ]),
                environment: HashMap::from([("ADVERTISED_IP".to_string(), ip.to_string())]),
                ..ContainerRunConfig::default()
            })
        })
        .await
        .expect("service added");

    assert_eq!(backend.calls(), vec!["register_service", "start_service"]);
    assert_eq!(service.service_id(), &ServiceId::new("kv"));
    assert_eq!(service.ip_address(), "172.23.0.2");
    assert_eq!(bindings["8080/tcp"].interface_port, "32000");

    let written = std::fs::read_to_string(dir.path().join("kv/config")).expect("generated file");
    assert_eq!(written, "listen=172.23.0.2");

    let started = backend.started.lock().unwrap();
    let args = &started[0];
    assert_eq!(args.docker_image, "kv-store:1.0");
    assert_eq!(
        args.cmd_args,
        vec![
            "--config",
            "/test-volume/kv/config",
            "--schema",
            "/test-volume/static/schema"
        ]
    );
    assert!(args.entrypoint_args.is_empty());
    assert_eq!(args.docker_env_vars["ADVERTISED_IP"], "172.23.0.2");
    assert_eq!(args.suite_execution_vol_mnt_dirpath, "/test-volume");
    assert_eq!(
        args.files_artifact_mount_dirpaths["https://artifacts.example.com/dataset.tgz"],
        "/data"
    );
}

#[tokio::test]
async fn missing_generated_file_key_never_starts_the_service() {
    let backend = MockBackend::new();
    let dir = TempDir::new().expect("tempdir");
    let network = network(&backend, &dir, false);

    let creation = plain("alpine:3.12");
    let err = network
        .add_service(ServiceId::new("client"), creation, |_, generated, _| {
            let peers = generated.get("peers")?;
            Ok(ContainerRunConfig {
                cmd_override: Some(vec![peers.display().to_string()]),
                ..ContainerRunConfig::default()
            })
        })
        .await
        .expect_err("key was never declared");

    assert!(err.to_string().contains("'peers'"));
    match &err {
        MeshError::AddService { step, source, .. } => {
            assert_eq!(*step, AddServiceStep::BuildRunConfig);
            match &**source {
                MeshError::MissingGeneratedFile { key } => assert_eq!(key, "peers"),
                other => panic!("unexpected source: {other}"),
            }
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(backend.count("start_service"), 0);
}

#[tokio::test]
async fn undeclared_files_artifact_fails_before_start() {
    let backend = MockBackend::new();
    let dir = TempDir::new().expect("tempdir");
    let network = network(&backend, &dir, false);

    let creation = ContainerCreationConfig {
        files_artifact_mountpoints: HashMap::from([(
            FilesArtifactId::new("unknown"),
            "/data".into(),
        )]),
        ..plain("alpine:3.12")
    };
    let err = network
        .add_service(ServiceId::new("svc"), creation, |_, _, _| {
            Ok(ContainerRunConfig::default())
        })
        .await
        .expect_err("artifact has no URL");

    assert!(matches!(
        err,
        MeshError::AddService {
            step: AddServiceStep::ResolveArtifacts,
            ..
        }
    ));
    assert_eq!(backend.count("start_service"), 0);
}

#[tokio::test]
async fn start_failure_names_the_service() {
    let backend = MockBackend::new();
    *backend.fail_start.lock().unwrap() = true;
    let dir = TempDir::new().expect("tempdir");
    let network = network(&backend, &dir, false);

    let err = network
        .add_service(ServiceId::new("web"), plain("nginx:missing"), |_, _, _| {
            Ok(ContainerRunConfig::default())
        })
        .await
        .expect_err("start fails");

    let message = err.to_string();
    assert!(message.contains("'web'"));
    assert!(message.contains("image not found"));
    assert!(matches!(
        err,
        MeshError::AddService {
            step: AddServiceStep::Start,
            ..
        }
    ));
    let lookup = network.get_service_context(&ServiceId::new("web")).await;
    assert!(lookup.is_err());
}

#[tokio::test]
async fn duplicate_service_is_rejected_before_registration() {
    let backend = MockBackend::new();
    let dir = TempDir::new().expect("tempdir");
    let network = network(&backend, &dir, false);

    add_plain(&network, "a").await;
    let err = network
        .add_service(ServiceId::new("a"), plain("alpine:3.12"), |_, _, _| {
            Ok(ContainerRunConfig::default())
        })
        .await
        .expect_err("duplicate");

    assert!(matches!(err, MeshError::DuplicateService { .. }));
    assert_eq!(backend.count("register_service"), 1);
}

#[tokio::test]
async fn repartition_requires_partitioning_enabled() {
    let backend = MockBackend::new();
    let dir = TempDir::new().expect("tempdir");
    let network = network(&backend, &dir, false);
    add_plain(&network, "a").await;

    let repartitioner = network
        .repartitioner_builder(false)
        .with_partition(PartitionId::named("p1"), [ServiceId::new("a")])
        .build()
        .expect("valid");
    let err = network
        .repartition_network(repartitioner)
        .await
        .expect_err("disabled");

    assert!(matches!(err, MeshError::PartitioningDisabled));
    assert_eq!(backend.count("repartition"), 0);
}

#[tokio::test]
async fn repartition_rejects_unregistered_members() {
    let backend = MockBackend::new();
    let dir = TempDir::new().expect("tempdir");
    let network = network(&backend, &dir, true);
    add_plain(&network, "a").await;

    let members = [ServiceId::new("a"), ServiceId::new("ghost")];
    let repartitioner = network
        .repartitioner_builder(false)
        .with_partition(PartitionId::named("p1"), members)
        .build()
        .expect("valid");
    let err = network
        .repartition_network(repartitioner)
        .await
        .expect_err("ghost was never added");

    match err {
        MeshError::UnknownPartitionMember {
            partition_id,
            service_id,
        } => {
            assert_eq!(partition_id, PartitionId::named("p1"));
            assert_eq!(service_id, ServiceId::new("ghost"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(backend.count("repartition"), 0);
}

#[tokio::test]
async fn repartition_ships_the_whole_topology_in_one_call() {
    let backend = MockBackend::new();
    let dir = TempDir::new().expect("tempdir");
    let network = network(&backend, &dir, true);
    for id in ["a", "b", "c"] {
        add_plain(&network, id).await;
    }

    let members = [ServiceId::new("a"), ServiceId::new("b")];
    let repartitioner = network
        .repartitioner_builder(false)
        .with_partition(PartitionId::named("p1"), members)
        .with_partition(PartitionId::named("p2"), [ServiceId::new("c")])
        .with_partition_connection(PartitionId::named("p1"), PartitionId::named("p2"), true)
        .build()
        .expect("valid");
    network
        .repartition_network(repartitioner)
        .await
        .expect("repartitioned");

    assert_eq!(backend.count("repartition"), 1);
    let shipped = backend.repartitions.lock().unwrap()[0].clone();
    let p1: BTreeSet<_> = [ServiceId::new("a"), ServiceId::new("b")].into();
    let p2: BTreeSet<_> = [ServiceId::new("c")].into();
    assert_eq!(shipped.partition_services.len(), 2);
    assert_eq!(shipped.partition_services[&PartitionId::named("p1")], p1);
    assert_eq!(shipped.partition_services[&PartitionId::named("p2")], p2);
    assert_eq!(
        shipped.partition_connections[&PartitionId::named("p1")][&PartitionId::named("p2")],
        PartitionConnectionInfo::BLOCKED
    );
    assert_eq!(shipped.default_connection, PartitionConnectionInfo::OPEN);
}

#[tokio::test]
async fn removed_service_is_forgotten() {
    let backend = MockBackend::new();
    let dir = TempDir::new().expect("tempdir");
    let network = network(&backend, &dir, false);
    add_plain(&network, "a").await;

    network
        .remove_service(&ServiceId::new("a"), Duration::from_secs(10))
        .await
        .expect("removed");
    assert!(matches!(
        network.get_service_context(&ServiceId::new("a")).await,
        Err(MeshError::UnknownService { .. })
    ));
    assert!(network
        .remove_service(&ServiceId::new("a"), Duration::from_secs(10))
        .await
        .is_err());
    assert_eq!(backend.count("remove_service"), 1);
}

#[tokio::test]
async fn sub_second_stop_timeout_rounds_up() {
    let backend = MockBackend::new();
    let dir = TempDir::new().expect("tempdir");
    let network = network(&backend, &dir, false);
    add_plain(&network, "a").await;
    add_plain(&network, "b").await;

    network
        .remove_service(&ServiceId::new("a"), Duration::from_millis(500))
        .await
        .expect("removed");
    network
        .remove_service(&ServiceId::new("b"), Duration::from_secs(10))
        .await
        .expect("removed");

    assert_eq!(*backend.stop_timeouts.lock().unwrap(), vec![1, 10]);
}

#[tokio::test]
async fn service_context_execs_and_waits_through_the_backend() {
    let backend = MockBackend::new();
    let dir = TempDir::new().expect("tempdir");
    let network = network(&backend, &dir, false);
    add_plain(&network, "a").await;

    let service = network
        .get_service_context(&ServiceId::new("a"))
        .await
        .expect("added");
    let output = service.exec_command(["false"]).await.expect("exec");
    assert_eq!(output.exit_code, 1);
    assert!(!output.is_success());

    network
        .wait_for_endpoint_availability(&ServiceId::new("a"), EndpointCheck::new(8080, "/health"))
        .await
        .expect("available");
    assert!(network
        .wait_for_endpoint_availability(&ServiceId::new("zzz"), EndpointCheck::new(80, "/"))
        .await
        .is_err());
    assert_eq!(backend.count("wait_for_endpoint_availability"), 1);
}
