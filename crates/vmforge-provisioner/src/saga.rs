//! The provisioning saga (process manager).
//!
//! Reacts to persisted `request.approved` events. The triggering event
//! alone lacks the full provisioning parameters, so the saga re-derives
//! everything from the aggregate's own stream; it therefore tolerates
//! competing consumers and redelivered events, as long as the downstream
//! `mark_provisioning` transition stays guarded by optimistic concurrency.

use uuid::Uuid;
use vmforge_core::error::DomainError;
use vmforge_core::repository::EventRepository;
use vmforge_request::application::command_handlers::reconstitute;

use crate::handlers::{ProvisionVm, Provisioner};

/// Consumer of approval events that dispatches provisioning.
pub struct ProvisioningSaga<'a> {
    /// The event store the aggregate is re-derived from.
    pub repo: &'a dyn EventRepository,
    /// The provisioning handler and its collaborators.
    pub provisioner: &'a Provisioner<'a>,
}

impl ProvisioningSaga<'_> {
    /// Reacts to one persisted approval event for `aggregate_id`.
    ///
    /// Dispatch failures are logged with full context and swallowed: the
    /// saga is at-least-once, not exactly-once, and takes no further
    /// automatic action on failure.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` only when the event stream
    /// itself cannot be loaded or deserialized, so the feed consumer can
    /// retry the delivery instead of advancing past it.
    pub async fn on_request_approved(
        &self,
        aggregate_id: Uuid,
        correlation_id: Uuid,
    ) -> Result<(), DomainError> {
        let events = self.repo.load_events(aggregate_id).await?;
        if events.is_empty() {
            // An approval event for a stream with no events is a consistency
            // bug upstream, not a retryable condition.
            tracing::error!(
                %aggregate_id,
                %correlation_id,
                "approval event references an empty aggregate stream; aborting"
            );
            return Ok(());
        }
        let request = reconstitute(aggregate_id, &events)?;

        let command = ProvisionVm {
            correlation_id,
            tenant_id: request.tenant_id,
            request_id: aggregate_id,
            project_id: request.project_id,
            vm_name: request.vm_name.clone(),
            size: request.size.clone(),
            attempt: request.last_failure.as_ref().map_or(1, |f| f.retry_count + 1),
        };

        if let Err(e) = self.provisioner.handle_provision_vm(&command).await {
            tracing::error!(
                %aggregate_id,
                tenant_id = %request.tenant_id,
                %correlation_id,
                error = %e,
                "provisioning dispatch failed; awaiting redelivery or operator action"
            );
        }

        Ok(())
    }
}
