//! Scripted hypervisor double.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;
use vmforge_hypervisor::capabilities::{HotAddCapabilities, HypervisorCapabilities};
use vmforge_hypervisor::error::HypervisorError;
use vmforge_hypervisor::mapping::{MappingError, MappingSource, TenantResourceMapping};
use vmforge_hypervisor::port::HypervisorPort;
use vmforge_hypervisor::resources::{ResourceKind, ResourceNode};
use vmforge_hypervisor::vm::{BackendVmSpec, PowerState, ProvisioningResult, VmInfo};

/// A hypervisor double scripted with `create_vm` outcomes.
///
/// Each `create_vm` call pops the next scripted result; when the script is
/// exhausted, calls succeed with a generated machine id. All `create_vm`
/// specs are recorded for assertions.
#[derive(Debug, Default)]
pub struct FakeHypervisor {
    create_results: Mutex<VecDeque<Result<ProvisioningResult, HypervisorError>>>,
    created: Mutex<Vec<BackendVmSpec>>,
}

impl FakeHypervisor {
    /// Create a fake whose `create_vm` always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fake scripted with the given `create_vm` outcomes.
    #[must_use]
    pub fn with_create_results(
        results: Vec<Result<ProvisioningResult, HypervisorError>>,
    ) -> Self {
        Self {
            create_results: Mutex::new(results.into()),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of all `create_vm` specs received.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn created(&self) -> Vec<BackendVmSpec> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl HypervisorPort for FakeHypervisor {
    fn capabilities(&self) -> HypervisorCapabilities {
        HypervisorCapabilities {
            supports_snapshots: true,
            supports_live_migration: false,
            hot_add: HotAddCapabilities {
                cpu: true,
                memory: true,
                disk: false,
            },
            max_cpu: 64,
            max_memory_mib: 512 * 1024,
        }
    }

    async fn test_connection(&self) -> Result<(), HypervisorError> {
        Ok(())
    }

    async fn list_resources(&self) -> Result<Vec<ResourceNode>, HypervisorError> {
        Ok(vec![
            ResourceNode {
                id: "cluster-a".into(),
                name: "Cluster A".into(),
                kind: ResourceKind::Compute,
                children: vec![ResourceNode::leaf(
                    "host-1",
                    "Host 1",
                    ResourceKind::Compute,
                )],
            },
            ResourceNode::leaf("ds-main", "Main Datastore", ResourceKind::Storage),
            ResourceNode::leaf("net-1001", "Frontend", ResourceKind::Network),
        ])
    }

    async fn create_vm(&self, spec: &BackendVmSpec) -> Result<ProvisioningResult, HypervisorError> {
        self.created.lock().unwrap().push(spec.clone());
        self.create_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(ProvisioningResult {
                    machine_id: format!("vm-{}", spec.request_id.simple()),
                    ip_address: Some("10.0.0.10".into()),
                    hostname: Some(spec.name.clone()),
                    warning: None,
                })
            })
    }

    async fn get_vm(&self, machine_id: &str) -> Result<VmInfo, HypervisorError> {
        Ok(VmInfo {
            machine_id: machine_id.to_owned(),
            name: machine_id.to_owned(),
            power_state: PowerState::On,
            ip_address: Some("10.0.0.10".into()),
            hostname: None,
        })
    }

    async fn start_vm(&self, _machine_id: &str) -> Result<(), HypervisorError> {
        Ok(())
    }

    async fn stop_vm(&self, _machine_id: &str) -> Result<(), HypervisorError> {
        Ok(())
    }

    async fn delete_vm(&self, _machine_id: &str) -> Result<(), HypervisorError> {
        Ok(())
    }
}

/// A mapping source serving one fixed mapping for every tenant.
#[derive(Debug, Clone)]
pub struct FixedMappingSource(pub TenantResourceMapping);

impl FixedMappingSource {
    /// A mapping with one frontend network, suitable for most tests.
    #[must_use]
    pub fn simple() -> Self {
        Self(TenantResourceMapping {
            compute_target: "cluster-a".into(),
            datastore: "ds-main".into(),
            networks: HashMap::from([("frontend".to_owned(), "net-1001".to_owned())]),
            default_network: "frontend".into(),
        })
    }
}

#[async_trait]
impl MappingSource for FixedMappingSource {
    async fn mapping_for(&self, _tenant_id: Uuid) -> Result<TenantResourceMapping, MappingError> {
        Ok(self.0.clone())
    }
}

/// A mapping source with no mapping for any tenant.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingMappingSource;

#[async_trait]
impl MappingSource for MissingMappingSource {
    async fn mapping_for(&self, tenant_id: Uuid) -> Result<TenantResourceMapping, MappingError> {
        Err(MappingError::MissingTenantMapping { tenant_id })
    }
}
