//! Commands for the VM Request context.
//!
//! Commands are plain data records. The tenant and acting user are carried
//! explicitly on every command; nothing here reads ambient state.

use chrono::{DateTime, Utc};
use uuid::Uuid;
use vmforge_core::command::Command;

/// Command to submit a new VM request.
#[derive(Debug, Clone)]
pub struct CreateVmRequest {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The tenant the request belongs to.
    pub tenant_id: Uuid,
    /// The submitting user (also the acting user).
    pub requester_id: Uuid,
    /// The project the VM is requested for.
    pub project_id: Uuid,
    /// Requested VM name.
    pub vm_name: String,
    /// Requested size category.
    pub size: String,
    /// Business justification.
    pub justification: String,
    /// The requester's email as entered; parsed defensively by the handler.
    pub requester_email: String,
}

/// Command to cancel a pending VM request.
#[derive(Debug, Clone)]
pub struct CancelVmRequest {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The tenant the request belongs to.
    pub tenant_id: Uuid,
    /// The acting user; must be the original requester.
    pub actor_id: Uuid,
    /// The request to cancel.
    pub request_id: Uuid,
    /// Optional cancellation reason.
    pub reason: Option<String>,
}

/// Command to approve a pending VM request.
#[derive(Debug, Clone)]
pub struct ApproveVmRequest {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The tenant the request belongs to.
    pub tenant_id: Uuid,
    /// The approving admin.
    pub approver_id: Uuid,
    /// The request to approve.
    pub request_id: Uuid,
}

/// Command to reject a pending VM request.
#[derive(Debug, Clone)]
pub struct RejectVmRequest {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The tenant the request belongs to.
    pub tenant_id: Uuid,
    /// The rejecting admin.
    pub approver_id: Uuid,
    /// The request to reject.
    pub request_id: Uuid,
    /// The rejection reason shown to the requester.
    pub reason: String,
}

/// Command to mark an approved request as provisioning.
///
/// Issued by the provisioning saga, not by users; the actor is the system
/// identity the saga runs under.
#[derive(Debug, Clone)]
pub struct MarkProvisioning {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The tenant the request belongs to.
    pub tenant_id: Uuid,
    /// The system identity performing the transition.
    pub actor_id: Uuid,
    /// The request being provisioned.
    pub request_id: Uuid,
}

/// Command to record a successfully provisioned VM.
#[derive(Debug, Clone)]
pub struct RecordProvisioned {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The tenant the request belongs to.
    pub tenant_id: Uuid,
    /// The system identity performing the transition.
    pub actor_id: Uuid,
    /// The request that was provisioned.
    pub request_id: Uuid,
    /// Hypervisor-assigned machine identifier.
    pub machine_id: String,
    /// Assigned IP address, if known.
    pub ip_address: Option<String>,
    /// Assigned hostname, if known.
    pub hostname: Option<String>,
    /// Non-fatal warning from the backend.
    pub warning: Option<String>,
}

/// Command to record a provisioning failure.
#[derive(Debug, Clone)]
pub struct RecordProvisioningFailed {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The tenant the request belongs to.
    pub tenant_id: Uuid,
    /// The system identity performing the transition.
    pub actor_id: Uuid,
    /// The request that failed to provision.
    pub request_id: Uuid,
    /// Normalized error description.
    pub error: String,
    /// Whether the failure may succeed on retry.
    pub retriable: bool,
    /// The ordinal of the attempt that failed.
    pub retry_count: u32,
    /// When the failed attempt happened.
    pub last_attempt_at: DateTime<Utc>,
}

macro_rules! impl_command {
    ($ty:ty, $name:literal, $actor:ident) => {
        impl Command for $ty {
            fn command_type(&self) -> &'static str {
                $name
            }

            fn tenant_id(&self) -> Uuid {
                self.tenant_id
            }

            fn actor_id(&self) -> Uuid {
                self.$actor
            }

            fn correlation_id(&self) -> Uuid {
                self.correlation_id
            }
        }
    };
}

impl_command!(CreateVmRequest, "request.create", requester_id);
impl_command!(CancelVmRequest, "request.cancel", actor_id);
impl_command!(ApproveVmRequest, "request.approve", approver_id);
impl_command!(RejectVmRequest, "request.reject", approver_id);
impl_command!(MarkProvisioning, "request.mark_provisioning", actor_id);
impl_command!(RecordProvisioned, "request.record_provisioned", actor_id);
impl_command!(
    RecordProvisioningFailed,
    "request.record_provisioning_failed",
    actor_id
);
