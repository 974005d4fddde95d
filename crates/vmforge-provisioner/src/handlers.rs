//! The provisioning command handler.
//!
//! Drives one provisioning attempt: guard the transition, map resources,
//! call the backend, record the outcome as a domain event. The attempt
//! ordinal and timestamp are captured on failure events for an external
//! retry scheduler; no retry loop lives here.

use uuid::Uuid;
use vmforge_core::clock::Clock as _;
use vmforge_core::error::DomainError;
use vmforge_hypervisor::mapping::{self, MappingSource};
use vmforge_hypervisor::port::HypervisorPort;
use vmforge_hypervisor::vm::ProvisionRequest;
use vmforge_request::application::command_handlers::{
    RequestServices, handle_mark_provisioning, handle_record_provisioned,
    handle_record_provisioning_failed,
};
use vmforge_request::domain::commands::{
    MarkProvisioning, RecordProvisioned, RecordProvisioningFailed,
};

/// Command to provision the VM for an approved request.
#[derive(Debug, Clone)]
pub struct ProvisionVm {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The tenant the request belongs to.
    pub tenant_id: Uuid,
    /// The request being provisioned.
    pub request_id: Uuid,
    /// The project the VM belongs to.
    pub project_id: Uuid,
    /// Requested VM name.
    pub vm_name: String,
    /// Requested size category.
    pub size: String,
    /// The attempt ordinal, 1 for the first attempt. Set by the external
    /// retry policy on re-dispatch.
    pub attempt: u32,
}

/// Outcome of one provisioning attempt.
#[derive(Debug)]
pub enum ProvisionOutcome {
    /// The VM was created and recorded.
    Provisioned {
        /// Hypervisor-assigned machine identifier.
        machine_id: String,
    },
    /// The attempt failed; a `ProvisioningFailed` event was recorded.
    Failed {
        /// Normalized error description.
        error: String,
        /// Whether a retry may succeed.
        retriable: bool,
    },
    /// The request was not in `APPROVED`: a duplicate delivery or an
    /// already-running attempt. Nothing was done.
    Skipped {
        /// The request's current state.
        current: String,
    },
}

/// The collaborators of the provisioning handler.
pub struct Provisioner<'a> {
    /// Request command-handler services (store, projection, notifier...).
    pub services: &'a RequestServices<'a>,
    /// The virtualization backend.
    pub hypervisor: &'a dyn HypervisorPort,
    /// Per-tenant resource mappings.
    pub mappings: &'a dyn MappingSource,
    /// The system identity provisioning transitions are recorded under.
    pub actor_id: Uuid,
}

impl Provisioner<'_> {
    async fn record_failure(
        &self,
        command: &ProvisionVm,
        error: String,
        retriable: bool,
    ) -> Result<ProvisionOutcome, DomainError> {
        handle_record_provisioning_failed(
            &RecordProvisioningFailed {
                correlation_id: command.correlation_id,
                tenant_id: command.tenant_id,
                actor_id: self.actor_id,
                request_id: command.request_id,
                error: error.clone(),
                retriable,
                retry_count: command.attempt,
                last_attempt_at: self.services.clock.now(),
            },
            self.services,
        )
        .await?;

        Ok(ProvisionOutcome::Failed { error, retriable })
    }

    /// Runs one provisioning attempt for an approved request.
    ///
    /// The `mark_provisioning` transition is the idempotency guard: when it
    /// reports the request is not in `APPROVED`, the attempt is skipped
    /// rather than failed, which makes redelivered approval events safe.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for an unknown request or a
    /// tenant mismatch, and event store errors from any of the appends.
    /// Hypervisor and mapping failures are not errors here; they are
    /// recorded as `ProvisioningFailed` events and reported in the outcome.
    pub async fn handle_provision_vm(
        &self,
        command: &ProvisionVm,
    ) -> Result<ProvisionOutcome, DomainError> {
        let marked = handle_mark_provisioning(
            &MarkProvisioning {
                correlation_id: command.correlation_id,
                tenant_id: command.tenant_id,
                actor_id: self.actor_id,
                request_id: command.request_id,
            },
            self.services,
        )
        .await;

        match marked {
            Ok(_) => {}
            Err(DomainError::InvalidState { current }) => {
                tracing::debug!(
                    aggregate_id = %command.request_id,
                    tenant_id = %command.tenant_id,
                    correlation_id = %command.correlation_id,
                    %current,
                    "request not in APPROVED; treating as already-processed delivery"
                );
                return Ok(ProvisionOutcome::Skipped { current });
            }
            Err(e) => return Err(e),
        }

        let mapping = match self.mappings.mapping_for(command.tenant_id).await {
            Ok(mapping) => mapping,
            Err(e) => {
                return self.record_failure(command, e.to_string(), false).await;
            }
        };

        let request = ProvisionRequest {
            tenant_id: command.tenant_id,
            request_id: command.request_id,
            project_id: command.project_id,
            vm_name: command.vm_name.clone(),
            size: command.size.clone(),
            networks: Vec::new(),
        };
        let spec = match mapping::map_request(&request, &mapping) {
            Ok(spec) => spec,
            Err(e) => {
                return self.record_failure(command, e.to_string(), false).await;
            }
        };

        match self.hypervisor.create_vm(&spec).await {
            Ok(result) => {
                if let Some(warning) = &result.warning {
                    tracing::warn!(
                        aggregate_id = %command.request_id,
                        tenant_id = %command.tenant_id,
                        correlation_id = %command.correlation_id,
                        %warning,
                        "VM created with warning"
                    );
                }
                handle_record_provisioned(
                    &RecordProvisioned {
                        correlation_id: command.correlation_id,
                        tenant_id: command.tenant_id,
                        actor_id: self.actor_id,
                        request_id: command.request_id,
                        machine_id: result.machine_id.clone(),
                        ip_address: result.ip_address.clone(),
                        hostname: result.hostname.clone(),
                        warning: result.warning.clone(),
                    },
                    self.services,
                )
                .await?;

                Ok(ProvisionOutcome::Provisioned {
                    machine_id: result.machine_id,
                })
            }
            Err(e) => {
                let retriable = e.retriable();
                self.record_failure(command, e.to_string(), retriable).await
            }
        }
    }
}
