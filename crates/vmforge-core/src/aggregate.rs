//! Aggregate root abstraction.
//!
//! Aggregates are never stored; only their events are. Each use rebuilds
//! the aggregate by folding its stream through `apply`, which must stay
//! total and side-effect-free so replay always reproduces the same state.

use uuid::Uuid;

use crate::event::DomainEvent;

/// Trait for aggregate roots that reconstitute from event history.
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Returns the current version: the number of events applied, which is
    /// also the expected version for the next append.
    fn version(&self) -> i64;

    /// Applies an event to mutate internal state during reconstitution.
    /// Domain methods do not call this; they only push uncommitted events.
    fn apply(&mut self, event: &Self::Event);

    /// Returns uncommitted events produced by command handling.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Clears uncommitted events. Called only after a successful append.
    fn clear_uncommitted_events(&mut self);
}
