//! Projection store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Denormalized mirror of one request's current state, for listing and
/// filtering.
#[derive(Debug, Clone)]
pub struct RequestProjection {
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
    /// Current status name (e.g. "PENDING").
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
    /// When the request was submitted.
    pub requested_at: DateTime<Utc>,
    /// When the request was approved/rejected/cancelled.
    pub decided_at: Option<DateTime<Utc>>,
    /// When the VM finished provisioning.
    pub provisioned_at: Option<DateTime<Utc>>,
    /// Sequence number of the last event applied to this row.
    pub version: i64,
}

/// Status fields written on an approve/reject/cancel/provisioning
/// transition.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    /// The tenant the request belongs to.
    pub tenant_id: Uuid,
    /// The request identifier.
    pub request_id: Uuid,
    /// New status name.
    pub status: String,
    /// The deciding admin, when the transition has one.
    pub approved_by: Option<Uuid>,
    /// The rejection reason, when the transition has one.
    pub rejection_reason: Option<String>,
    /// When the decision happened, when the transition has one.
    pub decided_at: Option<DateTime<Utc>>,
    /// Sequence number of the event driving this update.
    pub version: i64,
}

/// Runtime VM fields written once provisioning completes.
#[derive(Debug, Clone)]
pub struct VmDetailsUpdate {
    /// The tenant the request belongs to.
    pub tenant_id: Uuid,
    /// The request identifier.
    pub request_id: Uuid,
    /// Hypervisor-assigned machine identifier.
    pub machine_id: String,
    /// Assigned IP address, if known.
    pub ip_address: Option<String>,
    /// Assigned hostname, if known.
    pub hostname: Option<String>,
    /// When provisioning completed.
    pub provisioned_at: DateTime<Utc>,
    /// Sequence number of the event driving this update.
    pub version: i64,
}

/// Outcome of a projection update.
///
/// `NotFound` means zero rows matched — the row is hidden by tenant
/// isolation or the projection is behind the event stream. That is an
/// expected, recoverable race with eventual consistency, so it is data,
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Exactly one row was written.
    Applied,
    /// Zero rows matched.
    NotFound,
}

/// I/O-level projection failure, always distinct from `NotFound`.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The underlying database operation failed.
    #[error("projection database error: {0}")]
    Database(String),
}

/// Write contract for the request read model.
///
/// All writes are idempotent: applying the same logical update twice
/// yields the same record.
#[async_trait]
pub trait ProjectionStore: Send + Sync {
    /// Inserts (or idempotently re-inserts) the projection row for a newly
    /// created request.
    async fn insert(&self, projection: &RequestProjection) -> Result<(), ProjectionError>;

    /// Updates the status fields of one request's row.
    async fn update_status(&self, update: &StatusUpdate) -> Result<WriteOutcome, ProjectionError>;

    /// Updates the runtime VM fields of one request's row.
    async fn update_vm_details(
        &self,
        update: &VmDetailsUpdate,
    ) -> Result<WriteOutcome, ProjectionError>;

    /// Removes one request's row. Removing an absent row is success — the
    /// desired end state already holds.
    async fn remove(&self, tenant_id: Uuid, request_id: Uuid) -> Result<(), ProjectionError>;
}
