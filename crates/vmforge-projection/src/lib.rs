//! VMForge — queryable read model for VM requests.
//!
//! The projection is derived, never authoritative: it may lag the event
//! stream and is always rebuildable from it. Writes are idempotent and
//! scoped to one row by `(tenant_id, request_id)`.

pub mod pg_projection_store;
pub mod schema;
pub mod store;
