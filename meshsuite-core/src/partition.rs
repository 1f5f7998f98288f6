//! Network partition model.
//!
//! A [`Repartitioner`] is the full target topology of a test network: which
//! services live in which partition, the explicit connectivity policy between
//! partition pairs, and the policy every other pair falls back to. It is built
//! by replaying an append-only list of builder actions and shipped to the
//! backend in one call, which replaces the previous topology wholesale.
//!
//! # Usage
//!
//! ```
//! use meshsuite_core::{PartitionId, RepartitionerBuilder, ServiceId};
//!
//! let repartitioner = RepartitionerBuilder::new(false)
//!     .with_partition(PartitionId::named("p1"), [ServiceId::new("a"), ServiceId::new("b")])
//!     .with_partition(PartitionId::named("p2"), [ServiceId::new("c")])
//!     .with_partition_connection(PartitionId::named("p1"), PartitionId::named("p2"), true)
//!     .build()
//!     .unwrap();
//!
//! assert!(repartitioner
//!     .connection_between(&PartitionId::named("p1"), &PartitionId::named("p2"))
//!     .is_blocked);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{MeshError, MeshResult};
use crate::ids::{PartitionId, ServiceId};

/// Connectivity policy between two partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionConnectionInfo {
    /// Whether traffic between the partitions is dropped.
    pub is_blocked: bool,
}

impl PartitionConnectionInfo {
    /// Traffic flows.
    pub const OPEN: Self = Self { is_blocked: false };
    /// Traffic is dropped.
    pub const BLOCKED: Self = Self { is_blocked: true };
}

/// Directed policies, keyed by source partition then destination partition.
pub type PartitionConnections =
    BTreeMap<PartitionId, BTreeMap<PartitionId, PartitionConnectionInfo>>;

/// One mutation of a pending topology.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RepartitionAction {
    /// Declare or overwrite a partition's member set.
    AddPartition {
        partition_id: PartitionId,
        services: BTreeSet<ServiceId>,
    },
    /// Declare the directed policy from `from` to `to`.
    AddPartitionConnection {
        from: PartitionId,
        to: PartitionId,
        connection: PartitionConnectionInfo,
    },
}

impl RepartitionAction {
    fn apply(self, target: &mut Repartitioner) {
        match self {
            Self::AddPartition {
                partition_id,
                services,
            } => {
                target.partition_services.insert(partition_id, services);
            }
            Self::AddPartitionConnection {
                from,
                to,
                connection,
            } => {
                target
                    .partition_connections
                    .entry(from)
                    .or_default()
                    .insert(to, connection);
            }
        }
    }
}

/// Builder for a [`Repartitioner`].
#[derive(Debug, Clone)]
pub struct RepartitionerBuilder {
    default_connection: PartitionConnectionInfo,
    actions: Vec<RepartitionAction>,
}

impl RepartitionerBuilder {
    /// Start a topology whose unlisted partition pairs are blocked or not.
    pub fn new(is_default_blocked: bool) -> Self {
        Self {
            default_connection: PartitionConnectionInfo {
                is_blocked: is_default_blocked,
            },
            actions: Vec::new(),
        }
    }

    /// Declare (or overwrite) a partition and its members.
    pub fn with_partition(
        mut self,
        partition_id: PartitionId,
        services: impl IntoIterator<Item = ServiceId>,
    ) -> Self {
        self.actions.push(RepartitionAction::AddPartition {
            partition_id,
            services: services.into_iter().collect(),
        });
        self
    }

    /// Declare the policy from partition `from` to partition `to`.
    pub fn with_partition_connection(
        mut self,
        from: PartitionId,
        to: PartitionId,
        is_blocked: bool,
    ) -> Self {
        self.actions.push(RepartitionAction::AddPartitionConnection {
            from,
            to,
            connection: PartitionConnectionInfo { is_blocked },
        });
        self
    }

    /// Replay the recorded actions into a topology.
    ///
    /// Fails when a partition is named `""` (which would alias the default
    /// partition on the wire) or when a service ends up in two partitions.
    pub fn build(self) -> MeshResult<Repartitioner> {
        let mut repartitioner = Repartitioner {
            partition_services: BTreeMap::new(),
            partition_connections: BTreeMap::new(),
            default_connection: self.default_connection,
        };
        for action in self.actions {
            let partitions: Vec<&PartitionId> = match &action {
                RepartitionAction::AddPartition { partition_id, .. } => vec![partition_id],
                RepartitionAction::AddPartitionConnection { from, to, .. } => vec![from, to],
            };
            if let Some(invalid) = partitions.into_iter().find(|id| !id.is_valid()) {
                return Err(MeshError::InvalidPartition {
                    partition_id: invalid.clone(),
                    reason: "a named partition cannot be empty".to_string(),
                });
            }
            action.apply(&mut repartitioner);
        }

        let mut owners: BTreeMap<&ServiceId, &PartitionId> = BTreeMap::new();
        for (partition_id, services) in &repartitioner.partition_services {
            for service_id in services {
                if let Some(previous) = owners.insert(service_id, partition_id) {
                    return Err(MeshError::InvalidPartition {
                        partition_id: partition_id.clone(),
                        reason: format!(
                            "service '{service_id}' is already a member of partition '{previous}'"
                        ),
                    });
                }
            }
        }

        Ok(repartitioner)
    }
}

/// A complete partition topology, ready to be applied to a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repartitioner {
    partition_services: BTreeMap<PartitionId, BTreeSet<ServiceId>>,
    partition_connections: PartitionConnections,
    default_connection: PartitionConnectionInfo,
}

impl Repartitioner {
    /// Members of every declared partition.
    pub fn partition_services(&self) -> &BTreeMap<PartitionId, BTreeSet<ServiceId>> {
        &self.partition_services
    }

    /// Explicit directed policies, keyed by source then destination.
    pub fn partition_connections(&self) -> &PartitionConnections {
        &self.partition_connections
    }

    /// Policy for every pair without an explicit entry.
    pub fn default_connection(&self) -> PartitionConnectionInfo {
        self.default_connection
    }

    /// Policy that applies from `from` to `to`.
    pub fn connection_between(
        &self,
        from: &PartitionId,
        to: &PartitionId,
    ) -> PartitionConnectionInfo {
        self.partition_connections
            .get(from)
            .and_then(|targets| targets.get(to))
            .copied()
            .unwrap_or(self.default_connection)
    }

    /// Every service named by any partition.
    pub fn services(&self) -> impl Iterator<Item = (&PartitionId, &ServiceId)> {
        self.partition_services
            .iter()
            .flat_map(|(partition_id, services)| {
                services.iter().map(move |s| (partition_id, s))
            })
    }
}
