//! Audit obligation engine.
//!
//! Decides whether an access must be recorded and synthesizes the record.
//! Sequence ids come from a process-wide atomic counter, so concurrent
//! appends never collide; gaps are acceptable when an append ultimately
//! fails.

use super::record::{AccessOutcome, AuditKind, AuditRecord, ChangeSummary};
use super::store::AuditStore;
use crate::catalog::{AuditRule, Catalog};
use crate::error::{AccessError, AccessResult};
use crate::identity::Identity;
use crate::policy::Operation;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Retry behavior for audit appends.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total append attempts before giving up.
    pub attempts: u32,
    /// Backoff before the first retry; doubles each retry.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_backoff: Duration::from_millis(50),
        }
    }
}

/// Synthesizes and appends audit records according to resource obligations.
pub struct AuditObligationEngine {
    catalog: Arc<Catalog>,
    store: Arc<dyn AuditStore>,
    sequence: AtomicU64,
    retry: RetryPolicy,
}

impl AuditObligationEngine {
    /// Create an engine over the given catalog and store.
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn AuditStore>) -> Self {
        Self {
            catalog,
            store,
            sequence: AtomicU64::new(1),
            retry: RetryPolicy::default(),
        }
    }

    /// Set the append retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Record an access attempt if the resource's audit rule obliges it.
    ///
    /// Returns the appended record, or `None` when no obligation held. Both
    /// allowed and denied attempts are recordable; the append is independent
    /// of whether the underlying mutation succeeded. When the obligation
    /// holds and append retries exhaust, the access fails closed with
    /// `AuditAppendFailure`.
    pub async fn record_access(
        &self,
        identity: &Identity,
        resource: &str,
        operation: Operation,
        outcome: AccessOutcome,
        touched_columns: &[String],
        change: Option<ChangeSummary>,
    ) -> AccessResult<Option<AuditRecord>> {
        let rule = match self.catalog.get(resource) {
            Some(def) => def.audit_rule(operation),
            // Attempts against undeclared resources are always recorded.
            None => AuditRule::Always,
        };

        if !rule.obliges(touched_columns) {
            return Ok(None);
        }

        let record = AuditRecord {
            seq: self.next_seq(),
            timestamp: Utc::now(),
            identity_id: identity.id.clone(),
            role: Some(identity.role),
            kind: AuditKind::Access {
                resource: resource.to_string(),
                operation,
                outcome,
                touched_columns: touched_columns.to_vec(),
                change,
            },
        };

        self.append_with_retry(record).await.map(Some)
    }

    /// Record an authentication attempt. Always appended.
    pub async fn record_authentication(
        &self,
        principal: &str,
        success: bool,
        detail: Option<String>,
    ) -> AccessResult<AuditRecord> {
        let record = AuditRecord {
            seq: self.next_seq(),
            timestamp: Utc::now(),
            identity_id: principal.to_string(),
            role: None,
            kind: AuditKind::Authentication { success, detail },
        };
        self.append_with_retry(record).await
    }

    /// Record a privilege grant or revoke. Always appended.
    pub async fn record_privilege_change(
        &self,
        actor: &Identity,
        subject: impl Into<String>,
        detail: impl Into<String>,
    ) -> AccessResult<AuditRecord> {
        let record = AuditRecord {
            seq: self.next_seq(),
            timestamp: Utc::now(),
            identity_id: actor.id.clone(),
            role: Some(actor.role),
            kind: AuditKind::PrivilegeChange {
                subject: subject.into(),
                detail: detail.into(),
            },
        };
        self.append_with_retry(record).await
    }

    fn next_seq(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    async fn append_with_retry(&self, record: AuditRecord) -> AccessResult<AuditRecord> {
        let mut backoff = self.retry.base_backoff;

        for attempt in 1..=self.retry.attempts {
            match self.store.append(record.clone()).await {
                Ok(()) => {
                    tracing::debug!(seq = record.seq, "audit record appended");
                    return Ok(record);
                }
                Err(error) if attempt < self.retry.attempts => {
                    tracing::warn!(
                        seq = record.seq,
                        attempt,
                        %error,
                        "audit append failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(error) => {
                    tracing::error!(seq = record.seq, %error, "audit append retries exhausted");
                    return Err(AccessError::AuditAppendFailure(error.to_string()));
                }
            }
        }

        // attempts >= 1 always returns inside the loop
        Err(AccessError::AuditAppendFailure(
            "no append attempts configured".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::store::{FlakyAuditStore, MemoryAuditStore};
    use crate::catalog::ResourceDef;
    use crate::identity::Role;
    use std::collections::BTreeSet;

    fn catalog() -> Arc<Catalog> {
        Arc::new(Catalog::from_resources([
            ResourceDef::new("Students")
                .with_audit(Operation::Read, AuditRule::WhenColumnsTouched(
                    BTreeSet::from(["sin".to_string()]),
                ))
                .with_audit(Operation::Update, AuditRule::Always),
            ResourceDef::new("Attendance"),
        ]))
    }

    fn teacher() -> Identity {
        Identity::new("t-100", Role::Teacher)
    }

    #[tokio::test]
    async fn test_always_obligation_records() {
        let store = Arc::new(MemoryAuditStore::new());
        let engine = AuditObligationEngine::new(catalog(), store.clone());

        let record = engine
            .record_access(
                &teacher(),
                "Students",
                Operation::Update,
                AccessOutcome::Allowed,
                &[],
                Some(ChangeSummary {
                    before: Some("grade=B".to_string()),
                    after: Some("grade=A".to_string()),
                }),
            )
            .await
            .unwrap();

        assert!(record.is_some());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_conditional_obligation() {
        let store = Arc::new(MemoryAuditStore::new());
        let engine = AuditObligationEngine::new(catalog(), store.clone());

        let untouched = engine
            .record_access(
                &teacher(),
                "Students",
                Operation::Read,
                AccessOutcome::Filtered,
                &["name".to_string()],
                None,
            )
            .await
            .unwrap();
        assert!(untouched.is_none());

        let touched = engine
            .record_access(
                &teacher(),
                "Students",
                Operation::Read,
                AccessOutcome::Filtered,
                &["name".to_string(), "sin".to_string()],
                None,
            )
            .await
            .unwrap();
        assert!(touched.is_some());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_never_obligation_skips() {
        let store = Arc::new(MemoryAuditStore::new());
        let engine = AuditObligationEngine::new(catalog(), store.clone());

        let record = engine
            .record_access(
                &teacher(),
                "Attendance",
                Operation::Read,
                AccessOutcome::Allowed,
                &[],
                None,
            )
            .await
            .unwrap();
        assert!(record.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_denied_attempts_are_recorded() {
        let store = Arc::new(MemoryAuditStore::new());
        let engine = AuditObligationEngine::new(catalog(), store.clone());

        let record = engine
            .record_access(
                &teacher(),
                "Students",
                Operation::Update,
                AccessOutcome::Denied,
                &[],
                None,
            )
            .await
            .unwrap()
            .unwrap();

        match record.kind {
            AuditKind::Access { outcome, .. } => assert_eq!(outcome, AccessOutcome::Denied),
            other => panic!("expected access record, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let store = Arc::new(FlakyAuditStore::failing(2));
        let engine = AuditObligationEngine::new(catalog(), store.clone()).with_retry(RetryPolicy {
            attempts: 3,
            base_backoff: Duration::from_millis(1),
        });

        let record = engine
            .record_access(
                &teacher(),
                "Students",
                Operation::Update,
                AccessOutcome::Allowed,
                &[],
                None,
            )
            .await
            .unwrap();
        assert!(record.is_some());
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_fails_closed() {
        let store = Arc::new(FlakyAuditStore::failing(10));
        let engine = AuditObligationEngine::new(catalog(), store).with_retry(RetryPolicy {
            attempts: 3,
            base_backoff: Duration::from_millis(1),
        });

        let err = engine
            .record_access(
                &teacher(),
                "Students",
                Operation::Update,
                AccessOutcome::Allowed,
                &[],
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::AuditAppendFailure(_)));
    }

    #[tokio::test]
    async fn test_concurrent_appends_unique_sequence() {
        let store = Arc::new(MemoryAuditStore::new());
        let engine = Arc::new(AuditObligationEngine::new(catalog(), store.clone()));

        let mut handles = Vec::new();
        for i in 0..100u32 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .record_access(
                        &Identity::new(format!("t-{}", i), Role::Teacher),
                        "Students",
                        Operation::Update,
                        AccessOutcome::Allowed,
                        &[],
                        None,
                    )
                    .await
                    .unwrap()
                    .unwrap()
                    .seq
            }));
        }

        let mut seqs = Vec::new();
        for handle in handles {
            seqs.push(handle.await.unwrap());
        }
        seqs.sort_unstable();
        let before_dedup = seqs.len();
        seqs.dedup();
        assert_eq!(seqs.len(), before_dedup, "duplicate sequence ids assigned");
        assert_eq!(seqs.len(), 100);
    }

    #[tokio::test]
    async fn test_authentication_and_privilege_records() {
        let store = Arc::new(MemoryAuditStore::new());
        let engine = AuditObligationEngine::new(catalog(), store.clone());

        engine
            .record_authentication("tok-bad", false, Some("unknown session".to_string()))
            .await
            .unwrap();
        engine
            .record_privilege_change(&teacher(), "t-200", "granted registrar")
            .await
            .unwrap();

        let records = store.records();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_failed_authentication());
        assert!(records[1].is_privilege_change());
        assert!(records[0].seq < records[1].seq);
    }
}
