//! Per-tenant resource mapping.
//!
//! Translates a tenant's abstract provisioning request into a
//! backend-native spec using the tenant's stored mapping. Unmappable input
//! fails fast here with a typed error rather than deep inside the backend
//! call.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::vm::{BackendVmSpec, ProvisionRequest};

/// A tenant's stored placement mapping.
#[derive(Debug, Clone)]
pub struct TenantResourceMapping {
    /// Backend compute placement target (cluster, pool, host).
    pub compute_target: String,
    /// Backend datastore for new VM disks.
    pub datastore: String,
    /// Logical network name to backend network id.
    pub networks: HashMap<String, String>,
    /// Logical name of the network used when a request names none.
    pub default_network: String,
}

/// Typed resource-mapping failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// No mapping is stored for the tenant.
    #[error("no resource mapping configured for tenant {tenant_id}")]
    MissingTenantMapping {
        /// The tenant without a mapping.
        tenant_id: Uuid,
    },

    /// A requested logical network has no backend id in the mapping table.
    #[error("no backend network mapped for logical network {network:?}")]
    MissingNetworkMapping {
        /// The unmapped logical network name.
        network: String,
    },
}

/// Source of per-tenant mappings (config store, admin UI tables).
#[async_trait]
pub trait MappingSource: Send + Sync {
    /// Returns the stored mapping for the tenant.
    async fn mapping_for(&self, tenant_id: Uuid) -> Result<TenantResourceMapping, MappingError>;
}

/// Translates `request` into a backend-native spec using `mapping`.
///
/// # Errors
///
/// Returns `MappingError::MissingNetworkMapping` when a requested logical
/// network (or the tenant's default network) is absent from the mapping
/// table.
pub fn map_request(
    request: &ProvisionRequest,
    mapping: &TenantResourceMapping,
) -> Result<BackendVmSpec, MappingError> {
    let logical_networks: Vec<&str> = if request.networks.is_empty() {
        vec![mapping.default_network.as_str()]
    } else {
        request.networks.iter().map(String::as_str).collect()
    };

    let network_ids = logical_networks
        .into_iter()
        .map(|name| {
            mapping
                .networks
                .get(name)
                .cloned()
                .ok_or_else(|| MappingError::MissingNetworkMapping {
                    network: name.to_owned(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BackendVmSpec {
        name: request.vm_name.clone(),
        size: request.size.clone(),
        compute_target: mapping.compute_target.clone(),
        datastore: mapping.datastore.clone(),
        network_ids,
        request_id: request.request_id,
    })
}
