//! Audit record types.
//!
//! Records are append-only. Nothing in the engine mutates or deletes one;
//! retention is the store collaborator's `purge_before` hook, invoked by a
//! separately authorized operator path.

use crate::identity::Role;
use crate::policy::Operation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of an access attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessOutcome {
    /// Access proceeded without row restriction.
    Allowed,
    /// Access proceeded under a row filter.
    Filtered,
    /// Access was refused.
    Denied,
}

impl std::fmt::Display for AccessOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessOutcome::Allowed => write!(f, "allowed"),
            AccessOutcome::Filtered => write!(f, "filtered"),
            AccessOutcome::Denied => write!(f, "denied"),
        }
    }
}

/// Before/after value summary for mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSummary {
    /// Summary of the prior state (None for inserts).
    pub before: Option<String>,
    /// Summary of the new state (None for deletes).
    pub after: Option<String>,
}

/// What an audit record describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuditKind {
    /// A data access attempt.
    Access {
        /// Resource accessed.
        resource: String,
        /// Operation attempted.
        operation: Operation,
        /// How the attempt concluded.
        outcome: AccessOutcome,
        /// Columns the access touched.
        touched_columns: Vec<String>,
        /// Value summary for mutations.
        change: Option<ChangeSummary>,
    },
    /// A session authentication attempt.
    Authentication {
        /// Whether authentication succeeded.
        success: bool,
        /// Failure detail, if any.
        detail: Option<String>,
    },
    /// A privilege grant or revoke.
    PrivilegeChange {
        /// Principal whose privileges changed.
        subject: String,
        /// What changed.
        detail: String,
    },
}

/// An entry in the append-only audit stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Monotonic sequence id. Unique across concurrent appends; gaps are
    /// acceptable.
    pub seq: u64,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Acting principal id (the attempted token for failed authentication).
    pub identity_id: String,
    /// Acting principal role, when known.
    pub role: Option<Role>,
    /// Event details.
    pub kind: AuditKind,
}

impl AuditRecord {
    /// Whether this record is a failed authentication.
    pub fn is_failed_authentication(&self) -> bool {
        matches!(
            self.kind,
            AuditKind::Authentication { success: false, .. }
        )
    }

    /// Whether this record is a privilege change.
    pub fn is_privilege_change(&self) -> bool {
        matches!(self.kind, AuditKind::PrivilegeChange { .. })
    }

    /// The accessed resource and operation, for access records.
    pub fn access(&self) -> Option<(&str, Operation)> {
        match &self.kind {
            AuditKind::Access {
                resource, operation, ..
            } => Some((resource.as_str(), *operation)),
            _ => None,
        }
    }

    /// Format the record as a log line.
    pub fn to_log_line(&self) -> String {
        let event = match &self.kind {
            AuditKind::Access {
                resource,
                operation,
                outcome,
                touched_columns,
                ..
            } => format!(
                "ACCESS resource={} op={} outcome={} columns={}",
                resource,
                operation,
                outcome,
                touched_columns.len()
            ),
            AuditKind::Authentication { success, detail } => {
                if *success {
                    "AUTH_SUCCESS".to_string()
                } else {
                    format!("AUTH_FAILED detail={:?}", detail)
                }
            }
            AuditKind::PrivilegeChange { subject, detail } => {
                format!("PRIVILEGE_CHANGE subject={} detail={}", subject, detail)
            }
        };

        let role = self
            .role
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{} seq={} identity={} role={} {}",
            self.timestamp.to_rfc3339(),
            self.seq,
            self.identity_id,
            role,
            event
        )
    }
}
