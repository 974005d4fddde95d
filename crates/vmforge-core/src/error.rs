//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
///
/// Domain rejections (`InvalidState`, `Forbidden`, `QuotaExceeded`,
/// `Validation`, `AggregateNotFound`) are returned before anything is
/// persisted; `ConcurrencyConflict` and `Infrastructure` are kept distinct
/// so callers can choose reload-and-retry versus backoff.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An aggregate was not found (or is hidden from the caller's tenant).
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// The aggregate is not in a state that permits the requested transition.
    #[error("invalid state transition: request is {current}")]
    InvalidState {
        /// The aggregate's current state name.
        current: String,
    },

    /// The acting user is not allowed to perform this operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A quota policy rejected the command.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}
