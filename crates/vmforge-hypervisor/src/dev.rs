//! In-process development backend.
//!
//! A real in-memory hypervisor for local development and integration
//! environments: it allocates machine ids, tracks power state, and enforces
//! a configurable capacity so exhaustion paths can be exercised without a
//! real cluster.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::capabilities::{HotAddCapabilities, HypervisorCapabilities};
use crate::error::HypervisorError;
use crate::port::HypervisorPort;
use crate::resources::{ResourceKind, ResourceNode};
use crate::vm::{BackendVmSpec, PowerState, ProvisioningResult, VmInfo};

#[derive(Debug)]
struct DevVm {
    name: String,
    power_state: PowerState,
    ip_address: String,
}

/// In-memory hypervisor backend.
#[derive(Debug)]
pub struct DevHypervisor {
    capacity: usize,
    next_id: AtomicU64,
    vms: Mutex<HashMap<String, DevVm>>,
}

impl DevHypervisor {
    /// Creates a dev backend that can hold up to `capacity` VMs.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_id: AtomicU64::new(1),
            vms: Mutex::new(HashMap::new()),
        }
    }

    fn lock_vms(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, DevVm>>, HypervisorError> {
        self.vms.lock().map_err(|_| HypervisorError::Unknown {
            reason: "dev backend state poisoned".into(),
        })
    }
}

#[async_trait]
impl HypervisorPort for DevHypervisor {
    fn capabilities(&self) -> HypervisorCapabilities {
        HypervisorCapabilities {
            supports_snapshots: false,
            supports_live_migration: false,
            hot_add: HotAddCapabilities {
                cpu: false,
                memory: false,
                disk: false,
            },
            max_cpu: 16,
            max_memory_mib: 64 * 1024,
        }
    }

    async fn test_connection(&self) -> Result<(), HypervisorError> {
        Ok(())
    }

    async fn list_resources(&self) -> Result<Vec<ResourceNode>, HypervisorError> {
        Ok(vec![
            ResourceNode::leaf("dev-compute", "Dev Compute", ResourceKind::Compute),
            ResourceNode::leaf("dev-storage", "Dev Storage", ResourceKind::Storage),
            ResourceNode::leaf("dev-net", "Dev Network", ResourceKind::Network),
        ])
    }

    async fn create_vm(&self, spec: &BackendVmSpec) -> Result<ProvisioningResult, HypervisorError> {
        let mut vms = self.lock_vms()?;

        if vms.len() >= self.capacity {
            return Err(HypervisorError::ResourceExhausted {
                resource: "vm slots".into(),
                requested: 1,
                available: 0,
            });
        }
        if vms.values().any(|vm| vm.name == spec.name) {
            return Err(HypervisorError::ResourceAlreadyExists {
                kind: "vm".into(),
                name: spec.name.clone(),
            });
        }

        let ordinal = self.next_id.fetch_add(1, Ordering::SeqCst);
        let machine_id = format!("dev-vm-{ordinal}");
        let ip_address = format!("10.42.0.{}", 1 + (ordinal % 250));
        vms.insert(
            machine_id.clone(),
            DevVm {
                name: spec.name.clone(),
                power_state: PowerState::On,
                ip_address: ip_address.clone(),
            },
        );

        Ok(ProvisioningResult {
            machine_id,
            ip_address: Some(ip_address),
            hostname: Some(spec.name.clone()),
            warning: None,
        })
    }

    async fn get_vm(&self, machine_id: &str) -> Result<VmInfo, HypervisorError> {
        let vms = self.lock_vms()?;
        let vm = vms
            .get(machine_id)
            .ok_or_else(|| HypervisorError::ResourceNotFound {
                kind: "vm".into(),
                name: machine_id.to_owned(),
            })?;
        Ok(VmInfo {
            machine_id: machine_id.to_owned(),
            name: vm.name.clone(),
            power_state: vm.power_state,
            ip_address: Some(vm.ip_address.clone()),
            hostname: Some(vm.name.clone()),
        })
    }

    async fn start_vm(&self, machine_id: &str) -> Result<(), HypervisorError> {
        let mut vms = self.lock_vms()?;
        let vm = vms
            .get_mut(machine_id)
            .ok_or_else(|| HypervisorError::ResourceNotFound {
                kind: "vm".into(),
                name: machine_id.to_owned(),
            })?;
        vm.power_state = PowerState::On;
        Ok(())
    }

    async fn stop_vm(&self, machine_id: &str) -> Result<(), HypervisorError> {
        let mut vms = self.lock_vms()?;
        let vm = vms
            .get_mut(machine_id)
            .ok_or_else(|| HypervisorError::ResourceNotFound {
                kind: "vm".into(),
                name: machine_id.to_owned(),
            })?;
        vm.power_state = PowerState::Off;
        Ok(())
    }

    async fn delete_vm(&self, machine_id: &str) -> Result<(), HypervisorError> {
        // Deleting an absent VM is already the desired end state.
        self.lock_vms()?.remove(machine_id);
        Ok(())
    }
}
