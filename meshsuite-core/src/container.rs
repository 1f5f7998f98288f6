//! Container creation and run configuration.
//!
//! Adding a service takes two values: a [`ContainerCreationConfig`], known
//! before the service exists, and a [`ContainerRunConfig`], produced by a
//! factory once the backend has assigned an IP address and file paths.
//!
//! ```
//! use std::collections::BTreeSet;
//! use meshsuite_core::ContainerCreationConfig;
//!
//! let creation = ContainerCreationConfig {
//!     used_ports: BTreeSet::from(["8080/tcp".to_string()]),
//!     ..ContainerCreationConfig::new("nginx:1.21")
//! };
//! assert_eq!(creation.image, "nginx:1.21");
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{MeshError, MeshResult};
use crate::ids::{FilesArtifactId, StaticFileId};

/// Where the test volume is mounted in service containers unless overridden.
pub const DEFAULT_TEST_VOLUME_MOUNTPOINT: &str = "/test-volume";

/// Error type file generators may return.
pub type GeneratorError = Box<dyn std::error::Error + Send + Sync>;

/// Writes a generated file. Receives the open file and the service's IP address.
pub type FileGenerator = Box<dyn Fn(&mut File, &str) -> Result<(), GeneratorError> + Send + Sync>;

/// Everything needed before the service has an address.
pub struct ContainerCreationConfig {
    /// Image to run.
    pub image: String,
    /// Where the test volume is mounted inside the container.
    pub test_volume_mountpoint: PathBuf,
    /// Ports the container listens on, such as `"8080/tcp"`.
    pub used_ports: BTreeSet<String>,
    /// Files generated before start, by key.
    pub file_generators: HashMap<String, FileGenerator>,
    /// Files artifacts to mount, by id, to a directory in the container.
    pub files_artifact_mountpoints: HashMap<FilesArtifactId, PathBuf>,
    /// Static files of the suite the service needs.
    pub static_files: BTreeSet<StaticFileId>,
}

impl ContainerCreationConfig {
    /// Config for `image` with everything else empty.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            test_volume_mountpoint: PathBuf::from(DEFAULT_TEST_VOLUME_MOUNTPOINT),
            used_ports: BTreeSet::new(),
            file_generators: HashMap::new(),
            files_artifact_mountpoints: HashMap::new(),
            static_files: BTreeSet::new(),
        }
    }
}

impl fmt::Debug for ContainerCreationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut generated: Vec<&String> = self.file_generators.keys().collect();
        generated.sort();
        f.debug_struct("ContainerCreationConfig")
            .field("image", &self.image)
            .field("test_volume_mountpoint", &self.test_volume_mountpoint)
            .field("used_ports", &self.used_ports)
            .field("file_generators", &generated)
            .field(
                "files_artifact_mountpoints",
                &self.files_artifact_mountpoints,
            )
            .field("static_files", &self.static_files)
            .finish()
    }
}

/// Everything decided once the service has an address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerRunConfig {
    /// Replaces the image entrypoint when set.
    pub entrypoint_override: Option<Vec<String>>,
    /// Replaces the image command when set.
    pub cmd_override: Option<Vec<String>>,
    /// Extra environment variables.
    pub environment: HashMap<String, String>,
}

/// Paths of generated files as seen from inside the service container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedFilePaths(HashMap<String, PathBuf>);

impl GeneratedFilePaths {
    /// Wrap a key to path map.
    pub fn new(paths: HashMap<String, PathBuf>) -> Self {
        Self(paths)
    }

    /// Path of the file generated under `key`.
    pub fn get(&self, key: &str) -> MeshResult<&Path> {
        self.0
            .get(key)
            .map(PathBuf::as_path)
            .ok_or_else(|| MeshError::MissingGeneratedFile {
                key: key.to_string(),
            })
    }

    /// Number of generated files.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no files were generated.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Paths of static files as seen from inside the service container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticFilePaths(HashMap<StaticFileId, PathBuf>);

impl StaticFilePaths {
    /// Wrap an id to path map.
    pub fn new(paths: HashMap<StaticFileId, PathBuf>) -> Self {
        Self(paths)
    }

    /// Path of the static file `id`.
    pub fn get(&self, id: &StaticFileId) -> MeshResult<&Path> {
        self.0
            .get(id)
            .map(PathBuf::as_path)
            .ok_or_else(|| MeshError::UnknownStaticFile {
                static_file_id: id.clone(),
            })
    }
}
