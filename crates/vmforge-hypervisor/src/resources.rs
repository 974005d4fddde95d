//! The generic backend resource tree.
//!
//! Each backend's own hierarchy (datacenters, clusters, pools, folders)
//! is translated into this common shape so callers can browse placement
//! targets without knowing the backend.

use serde::{Deserialize, Serialize};

/// The kind of a resource tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    /// A compute unit: host, cluster, resource pool.
    Compute,
    /// A storage unit: datastore, storage pool, volume.
    Storage,
    /// A network unit: port group, bridge, VLAN.
    Network,
}

/// One node of the translated resource hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Backend-native identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// What this node represents.
    pub kind: ResourceKind,
    /// Child nodes, in backend order.
    pub children: Vec<ResourceNode>,
}

impl ResourceNode {
    /// Creates a leaf node.
    #[must_use]
    pub fn leaf(id: impl Into<String>, name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            children: Vec::new(),
        }
    }
}
