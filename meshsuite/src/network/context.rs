//! Client-side view of a test network.

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use meshsuite_core::{
    AddServiceStep, ContainerCreationConfig, ContainerRunConfig, FilesArtifactId,
    GeneratedFilePaths, MeshError, MeshResult, PartitionId, Repartitioner, RepartitionerBuilder,
    ServiceId, StaticFilePaths,
};
use meshsuite_rpc::{
    PortBinding, RegisterServiceArgs, RegisterServiceResponse, RemoveServiceArgs, RepartitionArgs,
    StartServiceArgs, WaitForEndpointAvailabilityArgs,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::service::{EndpointCheck, ServiceContext};
use crate::backend::ApiContainerClient;

/// Container port to host binding, as returned when a service starts.
pub type HostPortBindings = HashMap<String, PortBinding>;

/// The network of one test: adds, removes and repartitions services.
///
/// Clones share the same set of services.
#[derive(Clone)]
pub struct NetworkContext {
    client: Arc<dyn ApiContainerClient>,
    files_artifact_urls: HashMap<FilesArtifactId, String>,
    suite_execution_volume: PathBuf,
    is_partitioning_enabled: bool,
    services: Arc<Mutex<HashMap<ServiceId, ServiceContext>>>,
}

fn failed_at(service_id: &ServiceId, step: AddServiceStep) -> impl FnOnce(MeshError) -> MeshError {
    let service_id = service_id.clone();
    move |source| MeshError::AddService {
        service_id,
        step,
        source: Box::new(source),
    }
}

/// Whole seconds, rounding any fraction up so a short grace period never becomes zero.
fn seconds_rounded_up(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl NetworkContext {
    /// Network backed by `client`.
    ///
    /// `suite_execution_volume` is where this process sees the volume shared
    /// with service containers; generated files are written under it.
    pub fn new(
        client: Arc<dyn ApiContainerClient>,
        files_artifact_urls: HashMap<FilesArtifactId, String>,
        suite_execution_volume: impl Into<PathBuf>,
        is_partitioning_enabled: bool,
    ) -> Self {
        Self {
            client,
            files_artifact_urls,
            suite_execution_volume: suite_execution_volume.into(),
            is_partitioning_enabled,
            services: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Add a service to the default partition.
    pub async fn add_service<F>(
        &self,
        service_id: ServiceId,
        creation: ContainerCreationConfig,
        run_config_factory: F,
    ) -> MeshResult<(ServiceContext, HostPortBindings)>
    where
        F: FnOnce(&str, &GeneratedFilePaths, &StaticFilePaths) -> MeshResult<ContainerRunConfig>
            + Send,
    {
        self.add_service_to_partition(
            service_id,
            PartitionId::Default,
            creation,
            run_config_factory,
        )
        .await
    }

    /// Add a service to `partition_id`.
    ///
    /// Registers the service, writes its generated files, resolves static
    /// files and files artifacts, asks `run_config_factory` for the run
    /// config, then starts the container. A failure is reported with the step
    /// it happened in; nothing already done is rolled back.
    pub async fn add_service_to_partition<F>(
        &self,
        service_id: ServiceId,
        partition_id: PartitionId,
        creation: ContainerCreationConfig,
        run_config_factory: F,
    ) -> MeshResult<(ServiceContext, HostPortBindings)>
    where
        F: FnOnce(&str, &GeneratedFilePaths, &StaticFilePaths) -> MeshResult<ContainerRunConfig>
            + Send,
    {
        let mut services = self.services.lock().await;
        if services.contains_key(&service_id) {
            return Err(MeshError::DuplicateService { service_id });
        }
        if !partition_id.is_valid() {
            return Err(MeshError::InvalidPartition {
                partition_id,
                reason: "a named partition cannot be empty".to_string(),
            });
        }

        let registration = self
            .client
            .register_service(RegisterServiceArgs {
                service_id: service_id.clone(),
                partition_id: partition_id.clone(),
                files_to_generate: creation.file_generators.keys().cloned().collect(),
                static_files: creation.static_files.clone(),
            })
            .await
            .map_err(failed_at(&service_id, AddServiceStep::Register))?;
        debug!(
            %service_id,
            %partition_id,
            ip_addr = %registration.ip_addr,
            "registered service"
        );

        let generated_files = self
            .generate_files(&creation, &registration)
            .map_err(failed_at(&service_id, AddServiceStep::GenerateFiles))?;
        let static_files = resolve_static_files(&creation, &registration)
            .map_err(failed_at(&service_id, AddServiceStep::ResolveStaticFiles))?;
        let files_artifact_mount_dirpaths = self
            .resolve_files_artifacts(&creation)
            .map_err(failed_at(&service_id, AddServiceStep::ResolveArtifacts))?;

        let run_config = run_config_factory(&registration.ip_addr, &generated_files, &static_files)
            .map_err(failed_at(&service_id, AddServiceStep::BuildRunConfig))?;

        let started = self
            .client
            .start_service(StartServiceArgs {
                service_id: service_id.clone(),
                docker_image: creation.image.clone(),
                used_ports: creation.used_ports.clone(),
                entrypoint_args: run_config.entrypoint_override.unwrap_or_default(),
                cmd_args: run_config.cmd_override.unwrap_or_default(),
                docker_env_vars: run_config.environment,
                suite_execution_vol_mnt_dirpath: path_string(&creation.test_volume_mountpoint),
                files_artifact_mount_dirpaths,
            })
            .await
            .map_err(failed_at(&service_id, AddServiceStep::Start))?;

        let service = ServiceContext::new(
            Arc::clone(&self.client),
            service_id.clone(),
            registration.ip_addr,
        );
        services.insert(service_id.clone(), service.clone());
        info!(
            %service_id,
            ip_addr = %service.ip_address(),
            image = %creation.image,
            "service started"
        );

        Ok((service, started.used_ports_host_port_bindings))
    }

    fn generate_files(
        &self,
        creation: &ContainerCreationConfig,
        registration: &RegisterServiceResponse,
    ) -> MeshResult<GeneratedFilePaths> {
        let mut paths = HashMap::with_capacity(creation.file_generators.len());
        for (key, generator) in &creation.file_generators {
            let relative = registration
                .generated_files_relative_filepaths
                .get(key)
                .ok_or_else(|| MeshError::MissingGeneratedFile { key: key.clone() })?;

            let local_path = self.suite_execution_volume.join(relative);
            if let Some(parent) = local_path.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    MeshError::io(format!("creating directory {}", parent.display()), e)
                })?;
            }
            let mut file = File::create(&local_path)
                .map_err(|e| MeshError::io(format!("creating {}", local_path.display()), e))?;
            generator(&mut file, &registration.ip_addr).map_err(|e| MeshError::FileGeneration {
                key: key.clone(),
                message: e.to_string(),
            })?;
            debug!(key = %key, path = %local_path.display(), "generated file");

            paths.insert(key.clone(), creation.test_volume_mountpoint.join(relative));
        }
        Ok(GeneratedFilePaths::new(paths))
    }

    fn resolve_files_artifacts(
        &self,
        creation: &ContainerCreationConfig,
    ) -> MeshResult<HashMap<String, String>> {
        creation
            .files_artifact_mountpoints
            .iter()
            .map(|(artifact_id, mountpoint)| {
                let url = self.files_artifact_urls.get(artifact_id).ok_or_else(|| {
                    MeshError::UnknownFilesArtifact {
                        artifact_id: artifact_id.clone(),
                    }
                })?;
                Ok((url.clone(), path_string(mountpoint)))
            })
            .collect()
    }

    /// Handle of a service added earlier.
    pub async fn get_service_context(&self, service_id: &ServiceId) -> MeshResult<ServiceContext> {
        self.services
            .lock()
            .await
            .get(service_id)
            .cloned()
            .ok_or_else(|| MeshError::UnknownService {
                service_id: service_id.clone(),
            })
    }

    /// Stop and deregister a service, giving it `stop_timeout` to exit.
    ///
    /// The backend takes whole seconds; a fractional timeout is rounded up.
    pub async fn remove_service(
        &self,
        service_id: &ServiceId,
        stop_timeout: Duration,
    ) -> MeshResult<()> {
        let mut services = self.services.lock().await;
        if !services.contains_key(service_id) {
            return Err(MeshError::UnknownService {
                service_id: service_id.clone(),
            });
        }
        self.client
            .remove_service(RemoveServiceArgs {
                service_id: service_id.clone(),
                container_stop_timeout_seconds: seconds_rounded_up(stop_timeout),
            })
            .await?;
        services.remove(service_id);
        info!(%service_id, "service removed");
        Ok(())
    }

    /// Start describing a new topology.
    pub fn repartitioner_builder(&self, is_default_blocked: bool) -> RepartitionerBuilder {
        RepartitionerBuilder::new(is_default_blocked)
    }

    /// Replace the network topology with `repartitioner`.
    ///
    /// Requires partitioning to be enabled on the test, and every member of
    /// every partition to have been added through this context.
    pub async fn repartition_network(&self, repartitioner: Repartitioner) -> MeshResult<()> {
        if !self.is_partitioning_enabled {
            return Err(MeshError::PartitioningDisabled);
        }
        {
            let services = self.services.lock().await;
            if let Some((partition_id, service_id)) = repartitioner
                .services()
                .find(|(_, service_id)| !services.contains_key(*service_id))
            {
                return Err(MeshError::UnknownPartitionMember {
                    partition_id: partition_id.clone(),
                    service_id: service_id.clone(),
                });
            }
        }

        let partitions = repartitioner.partition_services().len();
        self.client
            .repartition(RepartitionArgs {
                partition_services: repartitioner.partition_services().clone(),
                partition_connections: repartitioner.partition_connections().clone(),
                default_connection: repartitioner.default_connection(),
            })
            .await?;
        info!(partitions, "network repartitioned");
        Ok(())
    }

    /// Ask the backend to poll an HTTP endpoint of `service_id` until it answers.
    pub async fn wait_for_endpoint_availability(
        &self,
        service_id: &ServiceId,
        check: EndpointCheck,
    ) -> MeshResult<()> {
        let service = self.get_service_context(service_id).await?;
        self.client
            .wait_for_endpoint_availability(WaitForEndpointAvailabilityArgs {
                service_id: service.service_id().clone(),
                port: check.port,
                path: check.path,
                initial_delay_seconds: u32::try_from(check.initial_delay.as_secs())
                    .unwrap_or(u32::MAX),
                retries: check.retries,
                retries_delay_milliseconds: u32::try_from(check.retry_delay.as_millis())
                    .unwrap_or(u32::MAX),
                body_text: check.body_text.unwrap_or_default(),
            })
            .await
    }

    /// Whether repartitioning is allowed.
    pub fn is_partitioning_enabled(&self) -> bool {
        self.is_partitioning_enabled
    }
}

fn resolve_static_files(
    creation: &ContainerCreationConfig,
    registration: &RegisterServiceResponse,
) -> MeshResult<StaticFilePaths> {
    let mut paths = HashMap::with_capacity(creation.static_files.len());
    for static_file_id in &creation.static_files {
        let relative = registration
            .static_files_relative_filepaths
            .get(static_file_id)
            .ok_or_else(|| MeshError::UnknownStaticFile {
                static_file_id: static_file_id.clone(),
            })?;
        paths.insert(
            static_file_id.clone(),
            creation.test_volume_mountpoint.join(relative),
        );
    }
    Ok(StaticFilePaths::new(paths))
}
