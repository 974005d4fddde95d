//! `PostgreSQL` implementation of the `EventRepository` trait.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use vmforge_core::error::DomainError;
use vmforge_core::repository::{EventRepository, StoredEvent};

/// PostgreSQL-backed event repository.
#[derive(Debug, Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    /// Creates a new `PgEventRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, DomainError> {
        sqlx::query_scalar(
            "SELECT COALESCE(MAX(sequence_number), 0) FROM domain_events WHERE aggregate_id = $1",
        )
        .bind(aggregate_id)
        .fetch_one(&self.pool)
        .await
        .map_err(infra_err)
    }
}

fn infra_err(e: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("event store error: {e}"))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub(crate) fn row_to_stored_event(row: &sqlx::postgres::PgRow) -> Result<StoredEvent, DomainError> {
    let get = |col: &str| -> DomainError {
        DomainError::Infrastructure(format!("malformed event row: missing or invalid {col}"))
    };
    Ok(StoredEvent {
        event_id: row.try_get("event_id").map_err(|_| get("event_id"))?,
        aggregate_id: row
            .try_get("aggregate_id")
            .map_err(|_| get("aggregate_id"))?,
        event_type: row.try_get("event_type").map_err(|_| get("event_type"))?,
        payload: row.try_get("payload").map_err(|_| get("payload"))?,
        sequence_number: row
            .try_get("sequence_number")
            .map_err(|_| get("sequence_number"))?,
        tenant_id: row.try_get("tenant_id").map_err(|_| get("tenant_id"))?,
        actor_id: row.try_get("actor_id").map_err(|_| get("actor_id"))?,
        correlation_id: row
            .try_get("correlation_id")
            .map_err(|_| get("correlation_id"))?,
        causation_id: row
            .try_get("causation_id")
            .map_err(|_| get("causation_id"))?,
        occurred_at: row.try_get("occurred_at").map_err(|_| get("occurred_at"))?,
    })
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        let rows = sqlx::query(
            r"
            SELECT event_id, aggregate_id, event_type, payload, sequence_number,
                   tenant_id, actor_id, correlation_id, causation_id, occurred_at
            FROM domain_events
            WHERE aggregate_id = $1
            ORDER BY sequence_number
            ",
        )
        .bind(aggregate_id)
        .fetch_all(&self.pool)
        .await
        .map_err(infra_err)?;

        rows.iter().map(row_to_stored_event).collect()
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        if events.is_empty() {
            return Err(DomainError::Validation(
                "append_events requires at least one event".into(),
            ));
        }

        let mut tx = self.pool.begin().await.map_err(infra_err)?;

        let actual: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(sequence_number), 0) FROM domain_events WHERE aggregate_id = $1",
        )
        .bind(aggregate_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(infra_err)?;

        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        for event in events {
            let insert = sqlx::query(
                r"
                INSERT INTO domain_events (
                    event_id, aggregate_id, event_type, payload, sequence_number,
                    tenant_id, actor_id, correlation_id, causation_id, occurred_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ",
            )
            .bind(event.event_id)
            .bind(event.aggregate_id)
            .bind(&event.event_type)
            .bind(&event.payload)
            .bind(event.sequence_number)
            .bind(event.tenant_id)
            .bind(event.actor_id)
            .bind(event.correlation_id)
            .bind(event.causation_id)
            .bind(event.occurred_at)
            .execute(&mut *tx)
            .await;

            if let Err(e) = insert {
                // Two writers can both pass the version check under
                // READ COMMITTED; the unique constraint on
                // (aggregate_id, sequence_number) catches the loser.
                if is_unique_violation(&e) {
                    drop(tx);
                    let actual = self.current_version(aggregate_id).await?;
                    return Err(DomainError::ConcurrencyConflict {
                        aggregate_id,
                        expected: expected_version,
                        actual,
                    });
                }
                return Err(infra_err(e));
            }
        }

        tx.commit().await.map_err(infra_err)?;
        Ok(())
    }
}
