//! Worker-local implementations of the outbound ports.
//!
//! Real notification delivery and the timeline store live in the
//! surrounding system; this process logs them so nothing is silently
//! dropped while running standalone.

use async_trait::async_trait;
use uuid::Uuid;
use vmforge_hypervisor::mapping::{MappingError, MappingSource, TenantResourceMapping};
use vmforge_request::application::ports::{
    CreatedNotification, DecisionNotification, NotifyError, RequestNotifier, Timeline,
    TimelineError,
};

/// Notifier that logs instead of delivering.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl RequestNotifier for LoggingNotifier {
    async fn send_created(&self, notification: &CreatedNotification) -> Result<(), NotifyError> {
        tracing::info!(
            request_id = %notification.request_id,
            recipient = %notification.recipient,
            "request-created notification"
        );
        Ok(())
    }

    async fn send_approved(&self, notification: &DecisionNotification) -> Result<(), NotifyError> {
        tracing::info!(
            request_id = %notification.request_id,
            recipient = %notification.recipient,
            "request-approved notification"
        );
        Ok(())
    }

    async fn send_rejected(&self, notification: &DecisionNotification) -> Result<(), NotifyError> {
        tracing::info!(
            request_id = %notification.request_id,
            recipient = %notification.recipient,
            reason = ?notification.reason,
            "request-rejected notification"
        );
        Ok(())
    }
}

/// Timeline that logs instead of persisting.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingTimeline;

#[async_trait]
impl Timeline for LoggingTimeline {
    async fn record(
        &self,
        tenant_id: Uuid,
        request_id: Uuid,
        message: &str,
    ) -> Result<(), TimelineError> {
        tracing::info!(%tenant_id, %request_id, message, "timeline entry");
        Ok(())
    }
}

/// Serves one statically configured mapping to every tenant.
#[derive(Debug, Clone)]
pub struct StaticMappingSource {
    mapping: TenantResourceMapping,
}

impl StaticMappingSource {
    /// Creates a source serving `mapping` for all tenants.
    #[must_use]
    pub fn new(mapping: TenantResourceMapping) -> Self {
        Self { mapping }
    }
}

#[async_trait]
impl MappingSource for StaticMappingSource {
    async fn mapping_for(&self, _tenant_id: Uuid) -> Result<TenantResourceMapping, MappingError> {
        Ok(self.mapping.clone())
    }
}
