//! Command handlers for the VM Request context.
//!
//! Every handler follows the same skeleton: load events, reconstitute,
//! apply the domain operation, append with the expected version, and only
//! then run best-effort side effects (projection, notification, timeline).
//! A domain rejection returns before anything is persisted; a side-effect
//! failure after a successful append is logged and never fails the command.

use uuid::Uuid;
use vmforge_core::aggregate::AggregateRoot;
use vmforge_core::clock::Clock;
use vmforge_core::command::Command;
use vmforge_core::error::DomainError;
use vmforge_core::event::DomainEvent;
use vmforge_core::repository::{EventRepository, StoredEvent};
use vmforge_projection::store::{
    ProjectionError, ProjectionStore, RequestProjection, StatusUpdate, VmDetailsUpdate,
    WriteOutcome,
};

use crate::application::ports::{
    CreatedNotification, DecisionNotification, QuotaPolicy, RequestNotifier, Timeline,
};
use crate::domain::aggregates::{
    MachineDetails, NewRequest, ProvisioningFailure, RequestStatus, VmRequest,
};
use crate::domain::commands::{
    ApproveVmRequest, CancelVmRequest, CreateVmRequest, MarkProvisioning, RecordProvisioned,
    RecordProvisioningFailed, RejectVmRequest,
};
use crate::domain::events::{RequestEvent, RequestEventKind};
use crate::domain::values::{EmailAddress, SizeCategory};

/// The collaborators every request command handler works against.
pub struct RequestServices<'a> {
    /// Time source.
    pub clock: &'a dyn Clock,
    /// The event store.
    pub repo: &'a dyn EventRepository,
    /// The read model write path.
    pub projections: &'a dyn ProjectionStore,
    /// Requester notifications.
    pub notifier: &'a dyn RequestNotifier,
    /// Human-readable audit timeline.
    pub timeline: &'a dyn Timeline,
    /// Quota veto for new requests.
    pub quota: &'a dyn QuotaPolicy,
}

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct RequestCommandResult {
    /// The aggregate ID affected or created by the command.
    pub aggregate_id: Uuid,
    /// The stored events produced and persisted. Empty for an idempotent
    /// repeat of a terminal transition.
    pub stored_events: Vec<StoredEvent>,
}

fn to_stored_event(event: &RequestEvent) -> StoredEvent {
    let meta = event.metadata();
    StoredEvent {
        event_id: meta.event_id,
        aggregate_id: meta.aggregate_id,
        event_type: event.event_type().to_owned(),
        payload: event.to_payload(),
        sequence_number: meta.sequence_number,
        tenant_id: meta.tenant_id,
        actor_id: meta.actor_id,
        correlation_id: meta.correlation_id,
        causation_id: meta.causation_id,
        occurred_at: meta.occurred_at,
    }
}

/// Reconstitutes a `VmRequest` from stored events.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if event deserialization fails.
pub fn reconstitute(
    request_id: Uuid,
    existing_events: &[StoredEvent],
) -> Result<VmRequest, DomainError> {
    let mut request = VmRequest::new(request_id);
    for stored in existing_events {
        let kind: RequestEventKind =
            serde_json::from_value(stored.payload.clone()).map_err(|e| {
                DomainError::Infrastructure(format!("event deserialization failed: {e}"))
            })?;
        let event = RequestEvent {
            metadata: vmforge_core::event::EventMetadata {
                event_id: stored.event_id,
                event_type: stored.event_type.clone(),
                aggregate_id: stored.aggregate_id,
                sequence_number: stored.sequence_number,
                tenant_id: stored.tenant_id,
                actor_id: stored.actor_id,
                correlation_id: stored.correlation_id,
                causation_id: stored.causation_id,
                occurred_at: stored.occurred_at,
            },
            kind,
        };
        request.apply(&event);
    }
    Ok(request)
}

/// Persists the aggregate's uncommitted events and clears them.
///
/// Returns the stored events, or `None` when the operation was an
/// idempotent no-op and there is nothing to persist.
async fn persist(
    request: &mut VmRequest,
    repo: &dyn EventRepository,
) -> Result<Option<Vec<StoredEvent>>, DomainError> {
    if request.uncommitted_events().is_empty() {
        return Ok(None);
    }

    let stored_events: Vec<StoredEvent> = request
        .uncommitted_events()
        .iter()
        .map(to_stored_event)
        .collect();

    repo.append_events(request.id, request.version, &stored_events)
        .await?;
    request.clear_uncommitted_events();

    Ok(Some(stored_events))
}

fn log_projection_result(
    result: Result<WriteOutcome, ProjectionError>,
    aggregate_id: Uuid,
    tenant_id: Uuid,
    correlation_id: Uuid,
) {
    match result {
        Ok(WriteOutcome::Applied) => {}
        Ok(WriteOutcome::NotFound) => {
            tracing::warn!(
                %aggregate_id,
                %tenant_id,
                %correlation_id,
                "projection row not found; read model is behind the event stream"
            );
        }
        Err(e) => {
            tracing::warn!(
                %aggregate_id,
                %tenant_id,
                %correlation_id,
                error = %e,
                "projection update failed; read model will lag until rebuilt"
            );
        }
    }
}

fn requester_email(request: &VmRequest) -> Option<EmailAddress> {
    request
        .requester_email
        .as_deref()
        .and_then(|raw| EmailAddress::parse(raw).ok())
}

/// Handles the `CreateVmRequest` command: quota check, fresh aggregate,
/// create transition, persist, then best-effort projection insert and
/// created notification.
///
/// # Errors
///
/// Returns `DomainError::QuotaExceeded` when the quota policy vetoes the
/// request, `DomainError::Validation` for malformed input, and any event
/// store error from the append.
pub async fn handle_create_request(
    command: &CreateVmRequest,
    services: &RequestServices<'_>,
) -> Result<RequestCommandResult, DomainError> {
    tracing::debug!(
        command = command.command_type(),
        correlation_id = %command.correlation_id,
        "handling command"
    );

    if command.vm_name.trim().is_empty() {
        return Err(DomainError::Validation("VM name must not be empty".into()));
    }
    let size = SizeCategory::new(&command.size)?;

    // Quota rejection must short-circuit before any event is produced.
    services
        .quota
        .check(command.tenant_id, command.project_id, size.as_str())
        .await?;

    // A malformed requester email never fails the command; it only
    // suppresses notifications.
    let email = EmailAddress::parse(&command.requester_email).ok();
    if email.is_none() {
        tracing::debug!(
            tenant_id = %command.tenant_id,
            correlation_id = %command.correlation_id,
            "requester email did not parse; notifications will be skipped"
        );
    }

    let request_id = Uuid::new_v4();
    let mut request = VmRequest::new(request_id);

    request.create(
        NewRequest {
            tenant_id: command.tenant_id,
            requester_id: command.requester_id,
            project_id: command.project_id,
            vm_name: command.vm_name.clone(),
            size: size.as_str().to_owned(),
            justification: command.justification.clone(),
            requester_email: email.as_ref().map(|e| e.as_str().to_owned()),
        },
        command.correlation_id,
        services.clock,
    )?;

    // create always emits exactly one event.
    let Some(stored_events) = persist(&mut request, services.repo).await? else {
        return Err(DomainError::Infrastructure(
            "create produced no events".into(),
        ));
    };

    // Best-effort side effects, only after the append succeeded.
    let created = &stored_events[0];
    let projection = RequestProjection {
        request_id,
        tenant_id: command.tenant_id,
        requester_id: command.requester_id,
        project_id: command.project_id,
        vm_name: command.vm_name.clone(),
        size: size.as_str().to_owned(),
        justification: command.justification.clone(),
        status: RequestStatus::Pending.as_str().to_owned(),
        approved_by: None,
        rejection_reason: None,
        machine_id: None,
        ip_address: None,
        hostname: None,
        requested_at: created.occurred_at,
        decided_at: None,
        provisioned_at: None,
        version: created.sequence_number,
    };
    if let Err(e) = services.projections.insert(&projection).await {
        tracing::warn!(
            aggregate_id = %request_id,
            tenant_id = %command.tenant_id,
            correlation_id = %command.correlation_id,
            error = %e,
            "projection insert failed; read model will lag until rebuilt"
        );
    }

    if let Some(recipient) = email {
        let notification = CreatedNotification {
            recipient,
            request_id,
            vm_name: command.vm_name.clone(),
        };
        if let Err(e) = services.notifier.send_created(&notification).await {
            tracing::warn!(
                aggregate_id = %request_id,
                tenant_id = %command.tenant_id,
                correlation_id = %command.correlation_id,
                error = %e,
                "created notification failed"
            );
        }
    }

    Ok(RequestCommandResult {
        aggregate_id: request_id,
        stored_events,
    })
}

/// Handles the `CancelVmRequest` command: ownership check, cancel
/// transition, persist, then best-effort projection status update.
///
/// Cancelling an already-cancelled request succeeds without appending.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for an unknown request,
/// `DomainError::Forbidden` when the actor is not the original requester,
/// `DomainError::InvalidState` outside `PENDING`/`CANCELLED`, and any
/// event store error from the append.
pub async fn handle_cancel_request(
    command: &CancelVmRequest,
    services: &RequestServices<'_>,
) -> Result<RequestCommandResult, DomainError> {
    let existing_events = services.repo.load_events(command.request_id).await?;
    if existing_events.is_empty() {
        return Err(DomainError::AggregateNotFound(command.request_id));
    }
    let mut request = reconstitute(command.request_id, &existing_events)?;

    // Ownership is policy, checked here rather than in the state machine,
    // and before the transition so a non-owner always sees Forbidden.
    if request.requester_id != command.actor_id {
        return Err(DomainError::Forbidden(
            "only the original requester may cancel a request".into(),
        ));
    }

    request.cancel(
        command.actor_id,
        command.reason.clone(),
        command.correlation_id,
        services.clock,
    )?;

    let Some(stored_events) = persist(&mut request, services.repo).await? else {
        return Ok(RequestCommandResult {
            aggregate_id: command.request_id,
            stored_events: Vec::new(),
        });
    };

    let meta = &stored_events[0];
    log_projection_result(
        services
            .projections
            .update_status(&StatusUpdate {
                tenant_id: request.tenant_id,
                request_id: command.request_id,
                status: RequestStatus::Cancelled.as_str().to_owned(),
                approved_by: None,
                rejection_reason: None,
                decided_at: Some(meta.occurred_at),
                version: meta.sequence_number,
            })
            .await,
        command.request_id,
        request.tenant_id,
        command.correlation_id,
    );

    Ok(RequestCommandResult {
        aggregate_id: command.request_id,
        stored_events,
    })
}

/// Handles the `ApproveVmRequest` command: approve transition, persist,
/// then best-effort projection status update and approval notification.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for an unknown request,
/// `DomainError::InvalidState` outside `PENDING`, and any event store
/// error from the append.
pub async fn handle_approve_request(
    command: &ApproveVmRequest,
    services: &RequestServices<'_>,
) -> Result<RequestCommandResult, DomainError> {
    let existing_events = services.repo.load_events(command.request_id).await?;
    if existing_events.is_empty() {
        return Err(DomainError::AggregateNotFound(command.request_id));
    }
    let mut request = reconstitute(command.request_id, &existing_events)?;

    request.approve(command.approver_id, command.correlation_id, services.clock)?;

    let Some(stored_events) = persist(&mut request, services.repo).await? else {
        return Ok(RequestCommandResult {
            aggregate_id: command.request_id,
            stored_events: Vec::new(),
        });
    };

    let meta = &stored_events[0];
    log_projection_result(
        services
            .projections
            .update_status(&StatusUpdate {
                tenant_id: request.tenant_id,
                request_id: command.request_id,
                status: RequestStatus::Approved.as_str().to_owned(),
                approved_by: Some(command.approver_id),
                rejection_reason: None,
                decided_at: Some(meta.occurred_at),
                version: meta.sequence_number,
            })
            .await,
        command.request_id,
        request.tenant_id,
        command.correlation_id,
    );

    if let Some(recipient) = requester_email(&request) {
        let notification = DecisionNotification {
            recipient,
            request_id: command.request_id,
            vm_name: request.vm_name.clone(),
            reason: None,
        };
        if let Err(e) = services.notifier.send_approved(&notification).await {
            tracing::warn!(
                aggregate_id = %command.request_id,
                tenant_id = %request.tenant_id,
                correlation_id = %command.correlation_id,
                error = %e,
                "approval notification failed"
            );
        }
    }

    Ok(RequestCommandResult {
        aggregate_id: command.request_id,
        stored_events,
    })
}

/// Handles the `RejectVmRequest` command: reject transition, persist, then
/// best-effort projection status update and rejection notification.
///
/// Rejecting an already-rejected request succeeds without appending.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for an unknown request,
/// `DomainError::InvalidState` outside `PENDING`/`REJECTED`, and any event
/// store error from the append.
pub async fn handle_reject_request(
    command: &RejectVmRequest,
    services: &RequestServices<'_>,
) -> Result<RequestCommandResult, DomainError> {
    let existing_events = services.repo.load_events(command.request_id).await?;
    if existing_events.is_empty() {
        return Err(DomainError::AggregateNotFound(command.request_id));
    }
    let mut request = reconstitute(command.request_id, &existing_events)?;

    request.reject(
        command.approver_id,
        command.reason.clone(),
        command.correlation_id,
        services.clock,
    )?;

    let Some(stored_events) = persist(&mut request, services.repo).await? else {
        return Ok(RequestCommandResult {
            aggregate_id: command.request_id,
            stored_events: Vec::new(),
        });
    };

    let meta = &stored_events[0];
    log_projection_result(
        services
            .projections
            .update_status(&StatusUpdate {
                tenant_id: request.tenant_id,
                request_id: command.request_id,
                status: RequestStatus::Rejected.as_str().to_owned(),
                approved_by: Some(command.approver_id),
                rejection_reason: Some(command.reason.clone()),
                decided_at: Some(meta.occurred_at),
                version: meta.sequence_number,
            })
            .await,
        command.request_id,
        request.tenant_id,
        command.correlation_id,
    );

    if let Some(recipient) = requester_email(&request) {
        let notification = DecisionNotification {
            recipient,
            request_id: command.request_id,
            vm_name: request.vm_name.clone(),
            reason: Some(command.reason.clone()),
        };
        if let Err(e) = services.notifier.send_rejected(&notification).await {
            tracing::warn!(
                aggregate_id = %command.request_id,
                tenant_id = %request.tenant_id,
                correlation_id = %command.correlation_id,
                error = %e,
                "rejection notification failed"
            );
        }
    }

    Ok(RequestCommandResult {
        aggregate_id: command.request_id,
        stored_events,
    })
}

/// Handles the `MarkProvisioning` command: tenant check, provisioning
/// transition, persist, then best-effort projection status update and a
/// "provisioning started" timeline entry.
///
/// A tenant mismatch reports `AggregateNotFound`, not a distinct error, so
/// existence is never revealed across tenants.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for an unknown request or a
/// tenant mismatch, `DomainError::InvalidState` outside `APPROVED`, and
/// any event store error from the append.
pub async fn handle_mark_provisioning(
    command: &MarkProvisioning,
    services: &RequestServices<'_>,
) -> Result<RequestCommandResult, DomainError> {
    tracing::debug!(
        command = command.command_type(),
        correlation_id = %command.correlation_id,
        "handling command"
    );

    let existing_events = services.repo.load_events(command.request_id).await?;
    if existing_events.is_empty() {
        return Err(DomainError::AggregateNotFound(command.request_id));
    }
    let mut request = reconstitute(command.request_id, &existing_events)?;

    if request.tenant_id != command.tenant_id {
        return Err(DomainError::AggregateNotFound(command.request_id));
    }

    request.mark_provisioning(command.actor_id, command.correlation_id, services.clock)?;

    let Some(stored_events) = persist(&mut request, services.repo).await? else {
        return Ok(RequestCommandResult {
            aggregate_id: command.request_id,
            stored_events: Vec::new(),
        });
    };

    let meta = &stored_events[0];
    log_projection_result(
        services
            .projections
            .update_status(&StatusUpdate {
                tenant_id: request.tenant_id,
                request_id: command.request_id,
                status: RequestStatus::Provisioning.as_str().to_owned(),
                approved_by: request.approved_by,
                rejection_reason: None,
                decided_at: None,
                version: meta.sequence_number,
            })
            .await,
        command.request_id,
        request.tenant_id,
        command.correlation_id,
    );

    if let Err(e) = services
        .timeline
        .record(request.tenant_id, command.request_id, "provisioning started")
        .await
    {
        tracing::warn!(
            aggregate_id = %command.request_id,
            tenant_id = %request.tenant_id,
            correlation_id = %command.correlation_id,
            error = %e,
            "timeline entry failed"
        );
    }

    Ok(RequestCommandResult {
        aggregate_id: command.request_id,
        stored_events,
    })
}

/// Handles the `RecordProvisioned` command: tenant check, provisioned
/// transition, persist, then best-effort projection status and VM-details
/// updates.
///
/// Recording an already-ready request succeeds without appending.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for an unknown request or a
/// tenant mismatch, `DomainError::InvalidState` outside
/// `PROVISIONING`/`READY`, and any event store error from the append.
pub async fn handle_record_provisioned(
    command: &RecordProvisioned,
    services: &RequestServices<'_>,
) -> Result<RequestCommandResult, DomainError> {
    let existing_events = services.repo.load_events(command.request_id).await?;
    if existing_events.is_empty() {
        return Err(DomainError::AggregateNotFound(command.request_id));
    }
    let mut request = reconstitute(command.request_id, &existing_events)?;

    if request.tenant_id != command.tenant_id {
        return Err(DomainError::AggregateNotFound(command.request_id));
    }

    request.record_provisioned(
        MachineDetails {
            machine_id: command.machine_id.clone(),
            ip_address: command.ip_address.clone(),
            hostname: command.hostname.clone(),
            warning: command.warning.clone(),
        },
        command.actor_id,
        command.correlation_id,
        services.clock,
    )?;

    let Some(stored_events) = persist(&mut request, services.repo).await? else {
        return Ok(RequestCommandResult {
            aggregate_id: command.request_id,
            stored_events: Vec::new(),
        });
    };

    let meta = &stored_events[0];
    log_projection_result(
        services
            .projections
            .update_status(&StatusUpdate {
                tenant_id: request.tenant_id,
                request_id: command.request_id,
                status: RequestStatus::Ready.as_str().to_owned(),
                approved_by: request.approved_by,
                rejection_reason: None,
                decided_at: None,
                version: meta.sequence_number,
            })
            .await,
        command.request_id,
        request.tenant_id,
        command.correlation_id,
    );
    log_projection_result(
        services
            .projections
            .update_vm_details(&VmDetailsUpdate {
                tenant_id: request.tenant_id,
                request_id: command.request_id,
                machine_id: command.machine_id.clone(),
                ip_address: command.ip_address.clone(),
                hostname: command.hostname.clone(),
                provisioned_at: meta.occurred_at,
                version: meta.sequence_number,
            })
            .await,
        command.request_id,
        request.tenant_id,
        command.correlation_id,
    );

    Ok(RequestCommandResult {
        aggregate_id: command.request_id,
        stored_events,
    })
}

/// Handles the `RecordProvisioningFailed` command: tenant check, failure
/// transition, persist, then best-effort projection status update.
///
/// Recording against an already-failed request succeeds without appending.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for an unknown request or a
/// tenant mismatch, `DomainError::InvalidState` outside
/// `PROVISIONING`/`FAILED`, and any event store error from the append.
pub async fn handle_record_provisioning_failed(
    command: &RecordProvisioningFailed,
    services: &RequestServices<'_>,
) -> Result<RequestCommandResult, DomainError> {
    let existing_events = services.repo.load_events(command.request_id).await?;
    if existing_events.is_empty() {
        return Err(DomainError::AggregateNotFound(command.request_id));
    }
    let mut request = reconstitute(command.request_id, &existing_events)?;

    if request.tenant_id != command.tenant_id {
        return Err(DomainError::AggregateNotFound(command.request_id));
    }

    request.record_provisioning_failed(
        ProvisioningFailure {
            error: command.error.clone(),
            retriable: command.retriable,
            retry_count: command.retry_count,
            last_attempt_at: command.last_attempt_at,
        },
        command.actor_id,
        command.correlation_id,
        services.clock,
    )?;

    let Some(stored_events) = persist(&mut request, services.repo).await? else {
        return Ok(RequestCommandResult {
            aggregate_id: command.request_id,
            stored_events: Vec::new(),
        });
    };

    let meta = &stored_events[0];
    log_projection_result(
        services
            .projections
            .update_status(&StatusUpdate {
                tenant_id: request.tenant_id,
                request_id: command.request_id,
                status: RequestStatus::Failed.as_str().to_owned(),
                approved_by: request.approved_by,
                rejection_reason: None,
                decided_at: None,
                version: meta.sequence_number,
            })
            .await,
        command.request_id,
        request.tenant_id,
        command.correlation_id,
    );

    Ok(RequestCommandResult {
        aggregate_id: command.request_id,
        stored_events,
    })
}
