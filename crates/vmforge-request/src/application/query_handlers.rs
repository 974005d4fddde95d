//! Query handlers for the VM Request context.
//!
//! These reconstitute the aggregate from the event stream and return
//! read-only view DTOs. Listing/filtering queries go to the projection
//! instead; this path is for callers that need the authoritative state.

use serde::Serialize;
use uuid::Uuid;
use vmforge_core::error::DomainError;
use vmforge_core::repository::EventRepository;
use vmforge_core::tenant::TenantContext;

use crate::application::command_handlers;

/// Read-only view of a VM request aggregate.
#[derive(Debug, Serialize)]
pub struct RequestView {
    /// The request identifier.
    pub request_id: Uuid,
    /// The tenant the request belongs to.
    pub tenant_id: Uuid,
    /// The user who submitted the request.
    pub requester_id: Uuid,
    /// The project the VM is requested for.
    pub project_id: Uuid,
    /// Requested VM name.
    pub vm_name: String,
    /// Requested size category.
    pub size: String,
    /// Business justification.
    pub justification: String,
    /// Current status name.
    pub status: String,
    /// The admin who approved, once approved.
    pub approved_by: Option<Uuid>,
    /// The rejection reason, once rejected.
    pub rejection_reason: Option<String>,
    /// Hypervisor-assigned machine identifier, once provisioned.
    pub machine_id: Option<String>,
    /// Assigned IP address, once provisioned.
    pub ip_address: Option<String>,
    /// Assigned hostname, once provisioned.
    pub hostname: Option<String>,
    /// Current version (event count).
    pub version: i64,
}

/// Retrieves a VM request by its aggregate ID, scoped to the caller's
/// tenant.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no events exist for the ID
/// or the aggregate belongs to another tenant.
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub async fn get_request_by_id(
    tenant: TenantContext,
    request_id: Uuid,
    repo: &dyn EventRepository,
) -> Result<RequestView, DomainError> {
    let stored_events = repo.load_events(request_id).await?;
    if stored_events.is_empty() {
        return Err(DomainError::AggregateNotFound(request_id));
    }
    let request = command_handlers::reconstitute(request_id, &stored_events)?;
    if request.tenant_id != tenant.tenant_id {
        return Err(DomainError::AggregateNotFound(request_id));
    }

    Ok(RequestView {
        request_id,
        tenant_id: request.tenant_id,
        requester_id: request.requester_id,
        project_id: request.project_id,
        vm_name: request.vm_name.clone(),
        size: request.size.clone(),
        justification: request.justification.clone(),
        status: request.status.as_str().to_owned(),
        approved_by: request.approved_by,
        rejection_reason: request.rejection_reason.clone(),
        machine_id: request.machine.as_ref().map(|m| m.machine_id.clone()),
        ip_address: request.machine.as_ref().and_then(|m| m.ip_address.clone()),
        hostname: request.machine.as_ref().and_then(|m| m.hostname.clone()),
        version: request.version,
    })
}
