//! Global-position event feed.
//!
//! Process managers consume persisted events through this feed. Delivery is
//! at-least-once: a consumer that crashes after handling an entry will see
//! it again, so everything triggered from the feed must be idempotent.

use async_trait::async_trait;
use sqlx::PgPool;

use vmforge_core::error::DomainError;
use vmforge_core::repository::StoredEvent;

use crate::pg_event_repository::row_to_stored_event;

/// One feed entry: a stored event plus its position in the global log.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    /// Monotonic position in the global event log.
    pub position: i64,
    /// The stored event at that position.
    pub event: StoredEvent,
}

/// A poll-based feed of persisted events of one type.
#[async_trait]
pub trait EventFeed: Send + Sync {
    /// Returns up to `limit` events with a global position greater than
    /// `after`, in position order.
    async fn poll_after(&self, after: i64, limit: i64) -> Result<Vec<FeedEntry>, DomainError>;
}

/// PostgreSQL-backed feed over the `domain_events` table, filtered to one
/// event type.
#[derive(Debug, Clone)]
pub struct PgEventFeed {
    pool: PgPool,
    event_type: String,
}

impl PgEventFeed {
    /// Creates a feed for the given event type.
    #[must_use]
    pub fn new(pool: PgPool, event_type: impl Into<String>) -> Self {
        Self {
            pool,
            event_type: event_type.into(),
        }
    }
}

#[async_trait]
impl EventFeed for PgEventFeed {
    async fn poll_after(&self, after: i64, limit: i64) -> Result<Vec<FeedEntry>, DomainError> {
        let rows = sqlx::query(
            r"
            SELECT global_position, event_id, aggregate_id, event_type, payload,
                   sequence_number, tenant_id, actor_id, correlation_id,
                   causation_id, occurred_at
            FROM domain_events
            WHERE event_type = $1 AND global_position > $2
            ORDER BY global_position
            LIMIT $3
            ",
        )
        .bind(&self.event_type)
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::Infrastructure(format!("event feed error: {e}")))?;

        rows.iter()
            .map(|row| {
                use sqlx::Row as _;
                let position: i64 = row.try_get("global_position").map_err(|_| {
                    DomainError::Infrastructure("malformed feed row: missing global_position".into())
                })?;
                Ok(FeedEntry {
                    position,
                    event: row_to_stored_event(row)?,
                })
            })
            .collect()
    }
}
