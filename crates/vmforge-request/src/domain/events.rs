//! Domain events for the VM Request context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vmforge_core::event::{DomainEvent, EventMetadata};

/// Emitted when a VM request is submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestCreated {
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
    /// Business justification supplied by the requester.
    pub justification: String,
    /// The requester's email, if it parsed; absent means no notifications.
    pub requester_email: Option<String>,
}

/// Emitted when a pending request is cancelled by its requester.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestCancelled {
    /// The request identifier.
    pub request_id: Uuid,
    /// Optional reason supplied by the requester.
    pub reason: Option<String>,
}

/// Emitted when an admin approves a pending request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestApproved {
    /// The request identifier.
    pub request_id: Uuid,
    /// The admin who approved.
    pub approved_by: Uuid,
}

/// Emitted when an admin rejects a pending request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRejected {
    /// The request identifier.
    pub request_id: Uuid,
    /// The admin who rejected.
    pub rejected_by: Uuid,
    /// The rejection reason shown to the requester.
    pub reason: String,
}

/// Emitted when provisioning is dispatched for an approved request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningStarted {
    /// The request identifier.
    pub request_id: Uuid,
}

/// Emitted when the hypervisor reports a successfully created VM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmProvisioned {
    /// The request identifier.
    pub request_id: Uuid,
    /// Hypervisor-assigned machine identifier.
    pub machine_id: String,
    /// Assigned IP address, if already known.
    pub ip_address: Option<String>,
    /// Assigned hostname, if already known.
    pub hostname: Option<String>,
    /// Non-fatal warning from the backend (e.g. guest-tools timeout).
    pub warning: Option<String>,
}

/// Emitted when provisioning fails.
///
/// `retry_count` and `last_attempt_at` are captured for an external retry
/// scheduler; no retry loop lives in this context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningFailed {
    /// The request identifier.
    pub request_id: Uuid,
    /// Normalized error description.
    pub error: String,
    /// Whether the failure may succeed on retry.
    pub retriable: bool,
    /// The ordinal of the attempt that failed (1 for the first).
    pub retry_count: u32,
    /// When the failed attempt happened.
    pub last_attempt_at: DateTime<Utc>,
}

/// Event payload variants for the VM Request context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RequestEventKind {
    /// A VM request has been submitted.
    RequestCreated(RequestCreated),
    /// A pending request has been cancelled.
    RequestCancelled(RequestCancelled),
    /// A pending request has been approved.
    RequestApproved(RequestApproved),
    /// A pending request has been rejected.
    RequestRejected(RequestRejected),
    /// Provisioning has been dispatched.
    ProvisioningStarted(ProvisioningStarted),
    /// The VM has been created by the hypervisor.
    VmProvisioned(VmProvisioned),
    /// Provisioning failed.
    ProvisioningFailed(ProvisioningFailed),
}

impl RequestEventKind {
    /// Returns the wire-level event type name for this variant.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RequestCreated(_) => "request.created",
            Self::RequestCancelled(_) => "request.cancelled",
            Self::RequestApproved(_) => "request.approved",
            Self::RequestRejected(_) => "request.rejected",
            Self::ProvisioningStarted(_) => "request.provisioning_started",
            Self::VmProvisioned(_) => "request.provisioned",
            Self::ProvisioningFailed(_) => "request.provisioning_failed",
        }
    }
}

/// Domain event envelope for the VM Request context.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: RequestEventKind,
}

impl DomainEvent for RequestEvent {
    fn event_type(&self) -> &'static str {
        self.kind.type_name()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("RequestEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
