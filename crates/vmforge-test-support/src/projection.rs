//! Test projection stores — mock `ProjectionStore` implementations.

use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;
use vmforge_projection::store::{
    ProjectionError, ProjectionStore, RequestProjection, StatusUpdate, VmDetailsUpdate,
    WriteOutcome,
};

/// A projection store that records every write and reports the configured
/// outcome for updates (`Applied` by default).
#[derive(Debug)]
pub struct RecordingProjectionStore {
    update_outcome: WriteOutcome,
    inserted: Mutex<Vec<RequestProjection>>,
    status_updates: Mutex<Vec<StatusUpdate>>,
    vm_updates: Mutex<Vec<VmDetailsUpdate>>,
    removed: Mutex<Vec<(Uuid, Uuid)>>,
}

impl RecordingProjectionStore {
    /// Create a recording store whose updates report `Applied`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_update_outcome(WriteOutcome::Applied)
    }

    /// Create a recording store whose updates report the given outcome,
    /// e.g. `NotFound` to simulate a lagging or tenant-hidden row.
    #[must_use]
    pub fn with_update_outcome(update_outcome: WriteOutcome) -> Self {
        Self {
            update_outcome,
            inserted: Mutex::new(Vec::new()),
            status_updates: Mutex::new(Vec::new()),
            vm_updates: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of all inserted projections.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn inserted(&self) -> Vec<RequestProjection> {
        self.inserted.lock().unwrap().clone()
    }

    /// Returns a snapshot of all status updates.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn status_updates(&self) -> Vec<StatusUpdate> {
        self.status_updates.lock().unwrap().clone()
    }

    /// Returns a snapshot of all VM-details updates.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn vm_updates(&self) -> Vec<VmDetailsUpdate> {
        self.vm_updates.lock().unwrap().clone()
    }

    /// Returns a snapshot of all removals as `(tenant_id, request_id)`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn removed(&self) -> Vec<(Uuid, Uuid)> {
        self.removed.lock().unwrap().clone()
    }
}

impl Default for RecordingProjectionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProjectionStore for RecordingProjectionStore {
    async fn insert(&self, projection: &RequestProjection) -> Result<(), ProjectionError> {
        self.inserted.lock().unwrap().push(projection.clone());
        Ok(())
    }

    async fn update_status(&self, update: &StatusUpdate) -> Result<WriteOutcome, ProjectionError> {
        self.status_updates.lock().unwrap().push(update.clone());
        Ok(self.update_outcome)
    }

    async fn update_vm_details(
        &self,
        update: &VmDetailsUpdate,
    ) -> Result<WriteOutcome, ProjectionError> {
        self.vm_updates.lock().unwrap().push(update.clone());
        Ok(self.update_outcome)
    }

    async fn remove(&self, tenant_id: Uuid, request_id: Uuid) -> Result<(), ProjectionError> {
        self.removed.lock().unwrap().push((tenant_id, request_id));
        Ok(())
    }
}

/// A projection store that always returns a database error. Useful for
/// asserting that projection failures never fail a command.
#[derive(Debug, Default)]
pub struct FailingProjectionStore;

#[async_trait]
impl ProjectionStore for FailingProjectionStore {
    async fn insert(&self, _projection: &RequestProjection) -> Result<(), ProjectionError> {
        Err(ProjectionError::Database("connection refused".into()))
    }

    async fn update_status(
        &self,
        _update: &StatusUpdate,
    ) -> Result<WriteOutcome, ProjectionError> {
        Err(ProjectionError::Database("connection refused".into()))
    }

    async fn update_vm_details(
        &self,
        _update: &VmDetailsUpdate,
    ) -> Result<WriteOutcome, ProjectionError> {
        Err(ProjectionError::Database("connection refused".into()))
    }

    async fn remove(&self, _tenant_id: Uuid, _request_id: Uuid) -> Result<(), ProjectionError> {
        Err(ProjectionError::Database("connection refused".into()))
    }
}
