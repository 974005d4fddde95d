//! Test doubles for the request context's outbound ports.

use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;
use vmforge_core::error::DomainError;
use vmforge_request::application::ports::{
    CreatedNotification, DecisionNotification, NotifyError, QuotaPolicy, RequestNotifier,
    Timeline, TimelineError,
};

/// Quota policy that rejects everything with the configured message.
#[derive(Debug, Clone)]
pub struct DenyAllQuota(pub String);

#[async_trait]
impl QuotaPolicy for DenyAllQuota {
    async fn check(
        &self,
        _tenant_id: Uuid,
        _project_id: Uuid,
        _size: &str,
    ) -> Result<(), DomainError> {
        Err(DomainError::QuotaExceeded(self.0.clone()))
    }
}

/// A notifier that records every notification and always succeeds.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    created: Mutex<Vec<CreatedNotification>>,
    approved: Mutex<Vec<DecisionNotification>>,
    rejected: Mutex<Vec<DecisionNotification>>,
}

impl RecordingNotifier {
    /// Create an empty recording notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all created notifications.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn created(&self) -> Vec<CreatedNotification> {
        self.created.lock().unwrap().clone()
    }

    /// Returns a snapshot of all approval notifications.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn approved(&self) -> Vec<DecisionNotification> {
        self.approved.lock().unwrap().clone()
    }

    /// Returns a snapshot of all rejection notifications.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn rejected(&self) -> Vec<DecisionNotification> {
        self.rejected.lock().unwrap().clone()
    }
}

#[async_trait]
impl RequestNotifier for RecordingNotifier {
    async fn send_created(&self, notification: &CreatedNotification) -> Result<(), NotifyError> {
        self.created.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn send_approved(&self, notification: &DecisionNotification) -> Result<(), NotifyError> {
        self.approved.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn send_rejected(&self, notification: &DecisionNotification) -> Result<(), NotifyError> {
        self.rejected.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// A notifier whose deliveries always fail.
#[derive(Debug, Default)]
pub struct FailingNotifier;

#[async_trait]
impl RequestNotifier for FailingNotifier {
    async fn send_created(&self, _notification: &CreatedNotification) -> Result<(), NotifyError> {
        Err(NotifyError::Delivery("smtp unreachable".into()))
    }

    async fn send_approved(
        &self,
        _notification: &DecisionNotification,
    ) -> Result<(), NotifyError> {
        Err(NotifyError::Delivery("smtp unreachable".into()))
    }

    async fn send_rejected(
        &self,
        _notification: &DecisionNotification,
    ) -> Result<(), NotifyError> {
        Err(NotifyError::Delivery("smtp unreachable".into()))
    }
}

/// A timeline that records entries as `(tenant_id, request_id, message)`.
#[derive(Debug, Default)]
pub struct RecordingTimeline {
    entries: Mutex<Vec<(Uuid, Uuid, String)>>,
}

impl RecordingTimeline {
    /// Create an empty recording timeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all recorded entries.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn entries(&self) -> Vec<(Uuid, Uuid, String)> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Timeline for RecordingTimeline {
    async fn record(
        &self,
        tenant_id: Uuid,
        request_id: Uuid,
        message: &str,
    ) -> Result<(), TimelineError> {
        self.entries
            .lock()
            .unwrap()
            .push((tenant_id, request_id, message.to_owned()));
        Ok(())
    }
}

/// A timeline whose writes always fail.
#[derive(Debug, Default)]
pub struct FailingTimeline;

#[async_trait]
impl Timeline for FailingTimeline {
    async fn record(
        &self,
        _tenant_id: Uuid,
        _request_id: Uuid,
        _message: &str,
    ) -> Result<(), TimelineError> {
        Err(TimelineError::Write("timeline store unavailable".into()))
    }
}
