//! The unified hypervisor error taxonomy.

use thiserror::Error;

/// Normalized failure from any hypervisor backend.
///
/// The taxonomy is flat and closed: adapters map every backend-specific
/// fault into exactly one variant. `retriable` distinguishes failures that
/// may succeed later (capacity, timeouts, connectivity) from those that
/// will not without operator intervention.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HypervisorError {
    /// The backend rejected our credentials.
    #[error("authentication failed: {reason}")]
    AuthenticationFailed {
        /// Backend-reported reason, secrets stripped.
        reason: String,
    },

    /// The credentials are valid but lack rights for this operation.
    #[error("authorization failed for {operation}")]
    AuthorizationFailed {
        /// The operation that was denied.
        operation: String,
    },

    /// A referenced backend resource does not exist.
    #[error("{kind} not found: {name}")]
    ResourceNotFound {
        /// Resource kind (e.g. "datastore", "network", "vm").
        kind: String,
        /// The missing resource's name or id.
        name: String,
    },

    /// The backend is out of capacity. May succeed once capacity frees up.
    #[error("{resource} exhausted: requested {requested}, available {available}")]
    ResourceExhausted {
        /// The exhausted resource (e.g. "cpu", "memory", "disk").
        resource: String,
        /// Units requested.
        requested: u64,
        /// Units available.
        available: u64,
    },

    /// A resource with this name already exists.
    #[error("{kind} already exists: {name}")]
    ResourceAlreadyExists {
        /// Resource kind.
        kind: String,
        /// The conflicting name.
        name: String,
    },

    /// The backend does not support this operation; consult
    /// `capabilities()` before calling optional operations.
    #[error("operation not supported by this backend: {operation}")]
    OperationNotSupported {
        /// The unsupported operation.
        operation: String,
    },

    /// The operation ran and failed for a transient backend-side reason.
    #[error("operation failed: {reason}")]
    OperationFailed {
        /// Backend-reported reason.
        reason: String,
    },

    /// The operation did not complete in time.
    #[error("{operation} timed out after {timeout_secs}s")]
    OperationTimeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout that elapsed.
        timeout_secs: u64,
    },

    /// The backend could not be reached.
    #[error("connection failed: {reason}")]
    ConnectionFailed {
        /// Transport-level reason.
        reason: String,
    },

    /// The adapter or backend configuration is invalid.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The VM spec was rejected by the backend.
    #[error("invalid VM spec: {reason}")]
    InvalidVmSpec {
        /// What the backend rejected.
        reason: String,
    },

    /// An unclassifiable backend failure.
    #[error("unknown hypervisor error: {reason}")]
    Unknown {
        /// Whatever detail the adapter could salvage.
        reason: String,
    },
}

impl HypervisorError {
    /// Whether a retry of the same operation may succeed.
    #[must_use]
    pub fn retriable(&self) -> bool {
        matches!(
            self,
            Self::ResourceExhausted { .. }
                | Self::OperationFailed { .. }
                | Self::OperationTimeout { .. }
                | Self::ConnectionFailed { .. }
        )
    }
}
