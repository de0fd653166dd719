//! Identity context.
//!
//! An `Identity` is resolved once at session start and passed by reference
//! to every decision call. There is no ambient "current user" state anywhere
//! in the engine.

use crate::error::{AccessError, AccessResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// The closed set of roles known to the system.
///
/// Role-keyed behavior lives in the policy registry, keyed by this enum.
/// Adding a role is a data change (new registry entries), not a code change.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Role {
    /// Full administrative access.
    Admin,
    /// Teaching staff, scoped to owned courses.
    Teacher,
    /// Counseling staff.
    Counselor,
    /// Registrar's office.
    Registrar,
    /// Read-only reporting access.
    ReadOnly,
    /// Any other authenticated principal.
    Other,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Teacher => write!(f, "teacher"),
            Role::Counselor => write!(f, "counselor"),
            Role::Registrar => write!(f, "registrar"),
            Role::ReadOnly => write!(f, "readonly"),
            Role::Other => write!(f, "other"),
        }
    }
}

/// A resolved caller identity, immutable for the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Principal identifier.
    pub id: String,
    /// Role from the closed set.
    pub role: Role,
    /// Scoping attribute (e.g., department), if the principal has one.
    pub department: Option<String>,
    /// When the session began.
    pub session_started_at: DateTime<Utc>,
}

impl Identity {
    /// Create a new identity with the session starting now.
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            department: None,
            session_started_at: Utc::now(),
        }
    }

    /// Set the department scoping attribute.
    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    /// Look up a scalar attribute by name for predicate binding.
    pub fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "id" => Some(self.id.clone()),
            "department" => self.department.clone(),
            _ => None,
        }
    }
}

/// Resolves session tokens to identities.
///
/// Pure lookup against an external session store; implementations must
/// reject unknown and expired sessions.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Resolve a session token to an identity.
    async fn resolve(&self, token: &str) -> AccessResult<Identity>;
}

struct SessionEntry {
    identity: Identity,
    expires_at: DateTime<Utc>,
}

/// In-memory session store for tests and embedding.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, SessionEntry>,
}

impl MemorySessionStore {
    /// Create an empty session store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session with a time-to-live.
    pub fn insert(&self, token: impl Into<String>, identity: Identity, ttl: Duration) {
        self.sessions.insert(
            token.into(),
            SessionEntry {
                identity,
                expires_at: Utc::now() + ttl,
            },
        );
    }

    /// Remove a session.
    pub fn remove(&self, token: &str) {
        self.sessions.remove(token);
    }
}

#[async_trait]
impl SessionResolver for MemorySessionStore {
    async fn resolve(&self, token: &str) -> AccessResult<Identity> {
        let expired = match self.sessions.get(token) {
            Some(entry) if entry.expires_at > Utc::now() => {
                return Ok(entry.identity.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.sessions.remove(token);
            Err(AccessError::Authentication(format!(
                "session expired: {}",
                token
            )))
        } else {
            Err(AccessError::Authentication(format!(
                "unknown session: {}",
                token
            )))
        }
    }
}
