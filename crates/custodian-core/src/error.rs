//! Engine error types.

use crate::identity::Role;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Access-control and audit errors.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Session could not be resolved to an identity. Fatal to the request.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Policy registry invariant violated at registration time.
    #[error("configuration conflict on {resource} for role {role}: {detail}")]
    ConfigurationConflict {
        /// Resource the conflicting rule targets.
        resource: String,
        /// Role the conflicting rule targets.
        role: Role,
        /// What overlapped.
        detail: String,
    },

    /// Request arrived outside the role's allowed access window.
    ///
    /// Surfaced as an access denial, not a system fault.
    #[error("role {role} is outside its allowed access window at {at}")]
    OutOfWindow {
        /// Role whose window was violated.
        role: Role,
        /// Request timestamp.
        at: DateTime<Utc>,
    },

    /// Audit append retries exhausted while the access was obliged to be
    /// recorded. The triggering access fails closed.
    #[error("audit append failed: {0}")]
    AuditAppendFailure(String),

    /// Rule registered against a resource the catalog does not know.
    #[error("unknown resource: {0}")]
    UnknownResource(String),

    /// Audit store collaborator failure.
    #[error("audit store error: {0}")]
    Store(String),

    /// Alert sink collaborator failure.
    #[error("alert sink error: {0}")]
    Sink(String),
}

/// Result type for access-control operations.
pub type AccessResult<T> = Result<T, AccessError>;
