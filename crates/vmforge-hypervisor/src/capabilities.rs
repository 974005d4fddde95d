//! Backend capability descriptors.

use serde::{Deserialize, Serialize};

/// Hot-add support per resource dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HotAddCapabilities {
    /// CPUs can be added to a running VM.
    pub cpu: bool,
    /// Memory can be added to a running VM.
    pub memory: bool,
    /// Disks can be attached to a running VM.
    pub disk: bool,
}

/// What a hypervisor backend can do.
///
/// Callers consult this before invoking optional operations; an adapter
/// answers an unsupported call with `OperationNotSupported`, never with a
/// generic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HypervisorCapabilities {
    /// VM snapshots are available.
    pub supports_snapshots: bool,
    /// VMs can be migrated between hosts without downtime.
    pub supports_live_migration: bool,
    /// Hot-add support.
    pub hot_add: HotAddCapabilities,
    /// Maximum CPUs per VM.
    pub max_cpu: u32,
    /// Maximum memory per VM, in MiB.
    pub max_memory_mib: u64,
}
