//! The access engine façade.
//!
//! Ties session resolution, predicate evaluation, and audit obligations
//! together behind one entry point. Embedders hold an `AccessEngine` and call
//! it per request; the anomaly monitor runs beside it over the same audit
//! store.

use crate::audit::{AccessOutcome, AuditObligationEngine, AuditRecord, ChangeSummary};
use crate::error::{AccessError, AccessResult};
use crate::evaluator::{AccessDecision, PredicateEvaluator};
use crate::identity::{Identity, SessionResolver};
use crate::policy::Operation;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Front door for access decisions.
pub struct AccessEngine {
    sessions: Arc<dyn SessionResolver>,
    evaluator: PredicateEvaluator,
    audit: Arc<AuditObligationEngine>,
}

impl AccessEngine {
    /// Create an engine.
    pub fn new(
        sessions: Arc<dyn SessionResolver>,
        evaluator: PredicateEvaluator,
        audit: Arc<AuditObligationEngine>,
    ) -> Self {
        Self {
            sessions,
            evaluator,
            audit,
        }
    }

    /// Resolve a session token, recording the attempt either way.
    ///
    /// A failed resolution is recorded against the attempted token; the
    /// anomaly monitor counts those records for the failed-login check.
    pub async fn authenticate(&self, token: &str) -> AccessResult<Identity> {
        match self.sessions.resolve(token).await {
            Ok(identity) => {
                self.audit
                    .record_authentication(&identity.id, true, None)
                    .await?;
                Ok(identity)
            }
            Err(error) => {
                tracing::info!(token, %error, "authentication rejected");
                if let Err(append_error) = self
                    .audit
                    .record_authentication(token, false, Some(error.to_string()))
                    .await
                {
                    tracing::error!(%append_error, "failed to record rejected authentication");
                }
                Err(error)
            }
        }
    }

    /// Evaluate an access request.
    ///
    /// An out-of-window request is recorded as a denied attempt (subject to
    /// the resource's audit rule) before the error is returned.
    pub async fn evaluate_access(
        &self,
        identity: &Identity,
        resource: &str,
        operation: Operation,
        now: DateTime<Utc>,
    ) -> AccessResult<AccessDecision> {
        match self.evaluator.evaluate(identity, resource, operation, now).await {
            Ok(decision) => Ok(decision),
            Err(error @ AccessError::OutOfWindow { .. }) => {
                self.audit
                    .record_access(
                        identity,
                        resource,
                        operation,
                        AccessOutcome::Denied,
                        &[],
                        None,
                    )
                    .await?;
                Err(error)
            }
            Err(error) => Err(error),
        }
    }

    /// Record an executed (or refused) access per the resource's audit rule.
    ///
    /// Called after query execution, when the touched columns are known.
    pub async fn record_access(
        &self,
        identity: &Identity,
        resource: &str,
        operation: Operation,
        outcome: AccessOutcome,
        touched_columns: &[String],
        change: Option<ChangeSummary>,
    ) -> AccessResult<Option<AuditRecord>> {
        self.audit
            .record_access(identity, resource, operation, outcome, touched_columns, change)
            .await
    }

    /// Record a privilege grant or revoke.
    pub async fn record_privilege_change(
        &self,
        actor: &Identity,
        subject: impl Into<String>,
        detail: impl Into<String>,
    ) -> AccessResult<AuditRecord> {
        self.audit.record_privilege_change(actor, subject, detail).await
    }
}
