//! Outbound ports consumed by the request command handlers.
//!
//! All of these are best-effort from the handlers' point of view except
//! `QuotaPolicy`, which runs before any event is produced and can veto the
//! command.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;
use vmforge_core::error::DomainError;

use crate::domain::values::EmailAddress;

/// Pluggable quota check consulted before a request is created.
#[async_trait]
pub trait QuotaPolicy: Send + Sync {
    /// Checks whether the tenant/project may request another VM of `size`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::QuotaExceeded` to veto the command.
    async fn check(&self, tenant_id: Uuid, project_id: Uuid, size: &str)
    -> Result<(), DomainError>;
}

/// Default quota policy: everything is allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAllow;

#[async_trait]
impl QuotaPolicy for AlwaysAllow {
    async fn check(
        &self,
        _tenant_id: Uuid,
        _project_id: Uuid,
        _size: &str,
    ) -> Result<(), DomainError> {
        Ok(())
    }
}

/// Notification delivery failure. Logged by callers, never escalated.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The delivery mechanism failed.
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Notification sent when a request is created.
#[derive(Debug, Clone)]
pub struct CreatedNotification {
    /// Where to send it.
    pub recipient: EmailAddress,
    /// The request identifier.
    pub request_id: Uuid,
    /// The requested VM name.
    pub vm_name: String,
}

/// Notification sent when a request is approved or rejected.
#[derive(Debug, Clone)]
pub struct DecisionNotification {
    /// Where to send it.
    pub recipient: EmailAddress,
    /// The request identifier.
    pub request_id: Uuid,
    /// The requested VM name.
    pub vm_name: String,
    /// The rejection reason, for rejections.
    pub reason: Option<String>,
}

/// Fire-and-forget notification contract. The delivery mechanism lives
/// outside this context; only the contract is consumed here.
#[async_trait]
pub trait RequestNotifier: Send + Sync {
    /// Notifies the requester that their request was received.
    async fn send_created(&self, notification: &CreatedNotification) -> Result<(), NotifyError>;

    /// Notifies the requester of an approval.
    async fn send_approved(&self, notification: &DecisionNotification) -> Result<(), NotifyError>;

    /// Notifies the requester of a rejection.
    async fn send_rejected(&self, notification: &DecisionNotification) -> Result<(), NotifyError>;
}

/// Timeline write failure. Logged by callers, never escalated.
#[derive(Debug, Error)]
pub enum TimelineError {
    /// The timeline store failed.
    #[error("timeline write failed: {0}")]
    Write(String),
}

/// Human-readable audit timeline for a request.
#[async_trait]
pub trait Timeline: Send + Sync {
    /// Records a timeline entry for the request.
    async fn record(
        &self,
        tenant_id: Uuid,
        request_id: Uuid,
        message: &str,
    ) -> Result<(), TimelineError>;
}
