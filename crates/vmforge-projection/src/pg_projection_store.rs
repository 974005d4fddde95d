//! `PostgreSQL` implementation of the `ProjectionStore` trait.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::store::{
    ProjectionError, ProjectionStore, RequestProjection, StatusUpdate, VmDetailsUpdate,
    WriteOutcome,
};

/// PostgreSQL-backed projection store.
///
/// Every statement is scoped by `(request_id, tenant_id)`; a row another
/// tenant owns is indistinguishable from a missing row.
#[derive(Debug, Clone)]
pub struct PgProjectionStore {
    pool: PgPool,
}

impl PgProjectionStore {
    /// Creates a new `PgProjectionStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> ProjectionError {
    ProjectionError::Database(e.to_string())
}

fn outcome(rows_affected: u64) -> WriteOutcome {
    if rows_affected == 0 {
        WriteOutcome::NotFound
    } else {
        WriteOutcome::Applied
    }
}

#[async_trait]
impl ProjectionStore for PgProjectionStore {
    async fn insert(&self, projection: &RequestProjection) -> Result<(), ProjectionError> {
        sqlx::query(
            r"
            INSERT INTO request_projections (
                request_id, tenant_id, requester_id, project_id, vm_name,
                size, justification, status, approved_by, rejection_reason,
                machine_id, ip_address, hostname, requested_at, decided_at,
                provisioned_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (request_id) DO UPDATE SET
                status = EXCLUDED.status,
                version = EXCLUDED.version
            ",
        )
        .bind(projection.request_id)
        .bind(projection.tenant_id)
        .bind(projection.requester_id)
        .bind(projection.project_id)
        .bind(&projection.vm_name)
        .bind(&projection.size)
        .bind(&projection.justification)
        .bind(&projection.status)
        .bind(projection.approved_by)
        .bind(&projection.rejection_reason)
        .bind(&projection.machine_id)
        .bind(&projection.ip_address)
        .bind(&projection.hostname)
        .bind(projection.requested_at)
        .bind(projection.decided_at)
        .bind(projection.provisioned_at)
        .bind(projection.version)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn update_status(&self, update: &StatusUpdate) -> Result<WriteOutcome, ProjectionError> {
        let result = sqlx::query(
            r"
            UPDATE request_projections
            SET status = $3,
                approved_by = $4,
                rejection_reason = $5,
                decided_at = COALESCE($6, decided_at),
                version = $7
            WHERE request_id = $1 AND tenant_id = $2
            ",
        )
        .bind(update.request_id)
        .bind(update.tenant_id)
        .bind(&update.status)
        .bind(update.approved_by)
        .bind(&update.rejection_reason)
        .bind(update.decided_at)
        .bind(update.version)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(outcome(result.rows_affected()))
    }

    async fn update_vm_details(
        &self,
        update: &VmDetailsUpdate,
    ) -> Result<WriteOutcome, ProjectionError> {
        let result = sqlx::query(
            r"
            UPDATE request_projections
            SET machine_id = $3,
                ip_address = $4,
                hostname = $5,
                provisioned_at = $6,
                version = $7
            WHERE request_id = $1 AND tenant_id = $2
            ",
        )
        .bind(update.request_id)
        .bind(update.tenant_id)
        .bind(&update.machine_id)
        .bind(&update.ip_address)
        .bind(&update.hostname)
        .bind(update.provisioned_at)
        .bind(update.version)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(outcome(result.rows_affected()))
    }

    async fn remove(&self, tenant_id: Uuid, request_id: Uuid) -> Result<(), ProjectionError> {
        // Zero rows affected is still success: the row is already gone.
        sqlx::query(
            r"
            DELETE FROM request_projections
            WHERE request_id = $1 AND tenant_id = $2
            ",
        )
        .bind(request_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}
