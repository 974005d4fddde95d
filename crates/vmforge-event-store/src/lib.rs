//! VMForge — PostgreSQL-backed event store.
//!
//! The append path is the single serialization point per aggregate stream:
//! optimistic concurrency is enforced by an expected-version check inside
//! the append transaction, backstopped by a unique constraint on
//! `(aggregate_id, sequence_number)`.

pub mod feed;
pub mod pg_event_repository;
pub mod schema;
