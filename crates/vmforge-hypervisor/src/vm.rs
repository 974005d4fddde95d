//! VM specs and lifecycle data crossing the port.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tenant's abstract provisioning request, before resource mapping.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    /// The tenant the VM belongs to.
    pub tenant_id: Uuid,
    /// The originating request aggregate.
    pub request_id: Uuid,
    /// The project the VM belongs to.
    pub project_id: Uuid,
    /// Requested VM name.
    pub vm_name: String,
    /// Requested size category.
    pub size: String,
    /// Logical network names to attach. Empty means the tenant's default
    /// network.
    pub networks: Vec<String>,
}

/// A backend-native VM spec, produced by resource mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendVmSpec {
    /// VM name.
    pub name: String,
    /// Size category label, interpreted by the backend adapter.
    pub size: String,
    /// Backend compute placement target.
    pub compute_target: String,
    /// Backend datastore for the VM's disks.
    pub datastore: String,
    /// Backend network identifiers, resolved from logical names.
    pub network_ids: Vec<String>,
    /// The originating request, for backend-side tagging.
    pub request_id: Uuid,
}

/// Outcome of a successful `create_vm` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningResult {
    /// Hypervisor-assigned machine identifier.
    pub machine_id: String,
    /// Assigned IP address, if the backend reported one in time.
    pub ip_address: Option<String>,
    /// Assigned hostname, if the backend reported one in time.
    pub hostname: Option<String>,
    /// Non-fatal warning (e.g. guest-tools did not come up in time).
    pub warning: Option<String>,
}

/// Power state of an existing VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    /// The VM is running.
    On,
    /// The VM is stopped.
    Off,
    /// The VM is suspended.
    Suspended,
}

/// Runtime information about an existing VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmInfo {
    /// Hypervisor-assigned machine identifier.
    pub machine_id: String,
    /// Current VM name.
    pub name: String,
    /// Current power state.
    pub power_state: PowerState,
    /// Current IP address, if known.
    pub ip_address: Option<String>,
    /// Current hostname, if known.
    pub hostname: Option<String>,
}
