//! Identifiers for services, partitions, static files and files artifacts.
//!
//! All identifiers are opaque strings on the wire. [`PartitionId`] is the one
//! exception worth knowing about: its default partition travels as `""`, but
//! in Rust it is the explicit [`PartitionId::Default`] variant so it can never
//! collide with a user-supplied name.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Unique name of a service instance within a test network.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    /// Create a service id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ServiceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Name of a network partition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum PartitionId {
    /// The partition every service lands in unless told otherwise.
    #[default]
    Default,
    /// A user-declared partition.
    Named(String),
}

impl PartitionId {
    /// Create a named partition.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Wire representation; the default partition is the empty string.
    pub fn as_wire(&self) -> &str {
        match self {
            Self::Default => "",
            Self::Named(name) => name,
        }
    }

    /// Parse the wire representation back into an id.
    pub fn from_wire(raw: &str) -> Self {
        if raw.is_empty() {
            Self::Default
        } else {
            Self::Named(raw.to_string())
        }
    }

    /// Whether this id is usable. `Named("")` would alias the default partition.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Default => true,
            Self::Named(name) => !name.is_empty(),
        }
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("<default>"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

impl Serialize for PartitionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for PartitionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw))
    }
}

/// Key of a static file shipped inside the test suite image.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticFileId(String);

impl StaticFileId {
    /// Create a static file id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StaticFileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key under which a test declares a files artifact URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilesArtifactId(String);

impl FilesArtifactId {
    /// Create a files artifact id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilesArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
