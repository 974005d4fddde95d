//! The hypervisor port trait.

use async_trait::async_trait;

use crate::capabilities::HypervisorCapabilities;
use crate::error::HypervisorError;
use crate::resources::ResourceNode;
use crate::vm::{BackendVmSpec, ProvisioningResult, VmInfo};

/// Abstract interface to one virtualization backend.
///
/// Implementations are adapters, not subclass hierarchies: a backend that
/// cannot perform an optional operation advertises that through
/// `capabilities()` and answers the call with
/// `HypervisorError::OperationNotSupported`.
#[async_trait]
pub trait HypervisorPort: Send + Sync {
    /// What this backend can do.
    fn capabilities(&self) -> HypervisorCapabilities;

    /// Verifies connectivity and credentials.
    async fn test_connection(&self) -> Result<(), HypervisorError>;

    /// Lists the backend's placement resources as a generic tree.
    async fn list_resources(&self) -> Result<Vec<ResourceNode>, HypervisorError>;

    /// Creates a VM from a mapped, backend-native spec.
    async fn create_vm(&self, spec: &BackendVmSpec) -> Result<ProvisioningResult, HypervisorError>;

    /// Fetches runtime information about an existing VM.
    async fn get_vm(&self, machine_id: &str) -> Result<VmInfo, HypervisorError>;

    /// Powers on a VM.
    async fn start_vm(&self, machine_id: &str) -> Result<(), HypervisorError>;

    /// Powers off a VM.
    async fn stop_vm(&self, machine_id: &str) -> Result<(), HypervisorError>;

    /// Deletes a VM and its disks.
    async fn delete_vm(&self, machine_id: &str) -> Result<(), HypervisorError>;
}
