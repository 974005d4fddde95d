//! Explicit tenant context.
//!
//! Whatever ambient mechanism the boundary layer uses (JWT claims, request
//! extensions) is translated into this explicit value before it reaches a
//! command handler. The core only reads it, never establishes or clears it.

use uuid::Uuid;

/// The tenant identity under which an operation executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    /// The tenant identifier.
    pub tenant_id: Uuid,
}

impl TenantContext {
    /// Creates a tenant context for the given tenant.
    #[must_use]
    pub fn new(tenant_id: Uuid) -> Self {
        Self { tenant_id }
    }
}
