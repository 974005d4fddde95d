//! Aggregate roots for the VM Request context.

use chrono::{DateTime, Utc};
use uuid::Uuid;
use vmforge_core::aggregate::AggregateRoot;
use vmforge_core::clock::Clock;
use vmforge_core::error::DomainError;
use vmforge_core::event::EventMetadata;

use super::events::{
    ProvisioningFailed, ProvisioningStarted, RequestApproved, RequestCancelled, RequestCreated,
    RequestEvent, RequestEventKind, RequestRejected, VmProvisioned,
};

/// Lifecycle states of a VM request.
///
/// `Pending` is the only initial state. `Rejected`, `Cancelled`, `Ready`
/// and `Failed` are terminal: the only transition they accept is an
/// idempotent repeat of the one that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// Submitted, awaiting an admin decision.
    Pending,
    /// Approved, awaiting provisioning dispatch.
    Approved,
    /// Rejected by an admin. Terminal.
    Rejected,
    /// Cancelled by the requester. Terminal.
    Cancelled,
    /// Provisioning dispatched to the hypervisor.
    Provisioning,
    /// The VM exists and is usable. Terminal.
    Ready,
    /// Provisioning failed. Terminal for domain transitions; retries are an
    /// external policy concern.
    Failed,
}

impl RequestStatus {
    /// Returns the canonical uppercase name of this status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
            Self::Provisioning => "PROVISIONING",
            Self::Ready => "READY",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for creating a new VM request.
#[derive(Debug, Clone)]
pub struct NewRequest {
    /// The tenant the request belongs to.
    pub tenant_id: Uuid,
    /// The user submitting the request.
    pub requester_id: Uuid,
    /// The project the VM is requested for.
    pub project_id: Uuid,
    /// Requested VM name.
    pub vm_name: String,
    /// Requested size category.
    pub size: String,
    /// Business justification.
    pub justification: String,
    /// The requester's email, if it parsed.
    pub requester_email: Option<String>,
}

/// Runtime details of a provisioned machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineDetails {
    /// Hypervisor-assigned machine identifier.
    pub machine_id: String,
    /// Assigned IP address, if known.
    pub ip_address: Option<String>,
    /// Assigned hostname, if known.
    pub hostname: Option<String>,
    /// Non-fatal warning from the backend.
    pub warning: Option<String>,
}

/// Details of the most recent provisioning failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningFailure {
    /// Normalized error description.
    pub error: String,
    /// Whether the failure may succeed on retry.
    pub retriable: bool,
    /// The ordinal of the attempt that failed.
    pub retry_count: u32,
    /// When the failed attempt happened.
    pub last_attempt_at: DateTime<Utc>,
}

/// The aggregate root for a VM request.
///
/// The sole authority for lifecycle transitions. Authorization ("only the
/// requester may cancel") and tenant checks live in the command handlers so
/// the state machine stays free of cross-cutting policy.
#[derive(Debug)]
pub struct VmRequest {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Current version (event count).
    pub version: i64,
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
    /// The requester's email, if it parsed at creation time.
    pub requester_email: Option<String>,
    /// Current lifecycle status.
    pub status: RequestStatus,
    /// The admin who approved, once approved.
    pub approved_by: Option<Uuid>,
    /// The admin who rejected, once rejected.
    pub rejected_by: Option<Uuid>,
    /// The rejection reason, once rejected.
    pub rejection_reason: Option<String>,
    /// The cancellation reason, once cancelled.
    pub cancel_reason: Option<String>,
    /// Machine details, once provisioned.
    pub machine: Option<MachineDetails>,
    /// The most recent provisioning failure, if any.
    pub last_failure: Option<ProvisioningFailure>,
    /// Uncommitted events pending persistence.
    uncommitted_events: Vec<RequestEvent>,
}

impl VmRequest {
    /// Creates an empty aggregate shell for the given id, ready for either
    /// `create` or reconstitution.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            tenant_id: Uuid::nil(),
            requester_id: Uuid::nil(),
            project_id: Uuid::nil(),
            vm_name: String::new(),
            size: String::new(),
            justification: String::new(),
            requester_email: None,
            status: RequestStatus::Pending,
            approved_by: None,
            rejected_by: None,
            rejection_reason: None,
            cancel_reason: None,
            machine: None,
            last_failure: None,
            uncommitted_events: Vec::new(),
        }
    }

    /// Returns the next sequence number for a new event.
    #[allow(clippy::cast_possible_wrap)]
    fn next_sequence_number(&self) -> i64 {
        self.version + self.uncommitted_events.len() as i64 + 1
    }

    fn push_event(
        &mut self,
        tenant_id: Uuid,
        actor_id: Uuid,
        kind: RequestEventKind,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) {
        let event = RequestEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.type_name().to_owned(),
                aggregate_id: self.id,
                sequence_number: self.next_sequence_number(),
                tenant_id,
                actor_id,
                correlation_id,
                causation_id: correlation_id,
                occurred_at: clock.now(),
            },
            kind,
        };

        self.uncommitted_events.push(event);
    }

    fn invalid_state(&self) -> DomainError {
        DomainError::InvalidState {
            current: self.status.as_str().to_owned(),
        }
    }

    /// Submits the request, producing a `RequestCreated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the aggregate already has
    /// history — create is only valid on a fresh id.
    pub fn create(
        &mut self,
        input: NewRequest,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.version != 0 || !self.uncommitted_events.is_empty() {
            return Err(self.invalid_state());
        }

        let actor_id = input.requester_id;
        let tenant_id = input.tenant_id;
        self.push_event(
            tenant_id,
            actor_id,
            RequestEventKind::RequestCreated(RequestCreated {
                request_id: self.id,
                tenant_id: input.tenant_id,
                requester_id: input.requester_id,
                project_id: input.project_id,
                vm_name: input.vm_name,
                size: input.size,
                justification: input.justification,
                requester_email: input.requester_email,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Cancels a pending request, producing a `RequestCancelled` event.
    ///
    /// Cancelling an already-cancelled request is a no-op success so that
    /// at-least-once command delivery stays safe.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` from any state other than
    /// `Pending` or `Cancelled`.
    pub fn cancel(
        &mut self,
        actor_id: Uuid,
        reason: Option<String>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        match self.status {
            RequestStatus::Cancelled => Ok(()),
            RequestStatus::Pending => {
                self.push_event(
                    self.tenant_id,
                    actor_id,
                    RequestEventKind::RequestCancelled(RequestCancelled {
                        request_id: self.id,
                        reason,
                    }),
                    correlation_id,
                    clock,
                );
                Ok(())
            }
            _ => Err(self.invalid_state()),
        }
    }

    /// Approves a pending request, producing a `RequestApproved` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` from any state other than
    /// `Pending`.
    pub fn approve(
        &mut self,
        approver_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.status != RequestStatus::Pending {
            return Err(self.invalid_state());
        }

        self.push_event(
            self.tenant_id,
            approver_id,
            RequestEventKind::RequestApproved(RequestApproved {
                request_id: self.id,
                approved_by: approver_id,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Rejects a pending request, producing a `RequestRejected` event.
    /// Idempotent when already rejected.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` from any state other than
    /// `Pending` or `Rejected`.
    pub fn reject(
        &mut self,
        approver_id: Uuid,
        reason: String,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        match self.status {
            RequestStatus::Rejected => Ok(()),
            RequestStatus::Pending => {
                self.push_event(
                    self.tenant_id,
                    approver_id,
                    RequestEventKind::RequestRejected(RequestRejected {
                        request_id: self.id,
                        rejected_by: approver_id,
                        reason,
                    }),
                    correlation_id,
                    clock,
                );
                Ok(())
            }
            _ => Err(self.invalid_state()),
        }
    }

    /// Marks an approved request as provisioning, producing a
    /// `ProvisioningStarted` event.
    ///
    /// This is the idempotency guard for at-least-once approval delivery:
    /// it succeeds exactly once per request, from `Approved`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` from any state other than
    /// `Approved`.
    pub fn mark_provisioning(
        &mut self,
        actor_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.status != RequestStatus::Approved {
            return Err(self.invalid_state());
        }

        self.push_event(
            self.tenant_id,
            actor_id,
            RequestEventKind::ProvisioningStarted(ProvisioningStarted {
                request_id: self.id,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Records a successfully provisioned VM, producing a `VmProvisioned`
    /// event. Idempotent when already `Ready`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` from any state other than
    /// `Provisioning` or `Ready`.
    pub fn record_provisioned(
        &mut self,
        details: MachineDetails,
        actor_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        match self.status {
            RequestStatus::Ready => Ok(()),
            RequestStatus::Provisioning => {
                self.push_event(
                    self.tenant_id,
                    actor_id,
                    RequestEventKind::VmProvisioned(VmProvisioned {
                        request_id: self.id,
                        machine_id: details.machine_id,
                        ip_address: details.ip_address,
                        hostname: details.hostname,
                        warning: details.warning,
                    }),
                    correlation_id,
                    clock,
                );
                Ok(())
            }
            _ => Err(self.invalid_state()),
        }
    }

    /// Records a provisioning failure, producing a `ProvisioningFailed`
    /// event. Idempotent when already `Failed`.
    ///
    /// The failure's retry data is captured for an external retry scheduler.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` from any state other than
    /// `Provisioning` or `Failed`.
    pub fn record_provisioning_failed(
        &mut self,
        failure: ProvisioningFailure,
        actor_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        match self.status {
            RequestStatus::Failed => Ok(()),
            RequestStatus::Provisioning => {
                self.push_event(
                    self.tenant_id,
                    actor_id,
                    RequestEventKind::ProvisioningFailed(ProvisioningFailed {
                        request_id: self.id,
                        error: failure.error,
                        retriable: failure.retriable,
                        retry_count: failure.retry_count,
                        last_attempt_at: failure.last_attempt_at,
                    }),
                    correlation_id,
                    clock,
                );
                Ok(())
            }
            _ => Err(self.invalid_state()),
        }
    }
}

impl AggregateRoot for VmRequest {
    type Event = RequestEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            RequestEventKind::RequestCreated(payload) => {
                self.tenant_id = payload.tenant_id;
                self.requester_id = payload.requester_id;
                self.project_id = payload.project_id;
                self.vm_name.clone_from(&payload.vm_name);
                self.size.clone_from(&payload.size);
                self.justification.clone_from(&payload.justification);
                self.requester_email.clone_from(&payload.requester_email);
                self.status = RequestStatus::Pending;
            }
            RequestEventKind::RequestCancelled(payload) => {
                self.status = RequestStatus::Cancelled;
                self.cancel_reason.clone_from(&payload.reason);
            }
            RequestEventKind::RequestApproved(payload) => {
                self.status = RequestStatus::Approved;
                self.approved_by = Some(payload.approved_by);
            }
            RequestEventKind::RequestRejected(payload) => {
                self.status = RequestStatus::Rejected;
                self.rejected_by = Some(payload.rejected_by);
                self.rejection_reason = Some(payload.reason.clone());
            }
            RequestEventKind::ProvisioningStarted(_) => {
                self.status = RequestStatus::Provisioning;
            }
            RequestEventKind::VmProvisioned(payload) => {
                self.status = RequestStatus::Ready;
                self.machine = Some(MachineDetails {
                    machine_id: payload.machine_id.clone(),
                    ip_address: payload.ip_address.clone(),
                    hostname: payload.hostname.clone(),
                    warning: payload.warning.clone(),
                });
            }
            RequestEventKind::ProvisioningFailed(payload) => {
                self.status = RequestStatus::Failed;
                self.last_failure = Some(ProvisioningFailure {
                    error: payload.error.clone(),
                    retriable: payload.retriable,
                    retry_count: payload.retry_count,
                    last_attempt_at: payload.last_attempt_at,
                });
            }
        }
        self.version += 1;
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }
}
