//! Audit store collaborator interface.
//!
//! The durable audit trail lives outside the engine. The engine appends
//! through this trait and the anomaly monitor reads back through it with
//! snapshot semantics: a query returns the records present when it ran, and
//! the log growing concurrently is expected, not an error.

use super::record::AuditRecord;
use crate::error::{AccessError, AccessResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Append-only audit trail backend.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append a record.
    async fn append(&self, record: AuditRecord) -> AccessResult<()>;

    /// All records with `timestamp >= cutoff`, in append order.
    async fn records_since(&self, cutoff: DateTime<Utc>) -> AccessResult<Vec<AuditRecord>>;

    /// Retention hook: drop records older than the cutoff. Requires separate
    /// operator authorization; never called from the decision path.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> AccessResult<u64>;
}

/// In-memory audit store for tests and embedding.
#[derive(Default)]
pub struct MemoryAuditStore {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, in append order.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, record: AuditRecord) -> AccessResult<()> {
        self.records.lock().push(record);
        Ok(())
    }

    async fn records_since(&self, cutoff: DateTime<Utc>) -> AccessResult<Vec<AuditRecord>> {
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|record| record.timestamp >= cutoff)
            .cloned()
            .collect())
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> AccessResult<u64> {
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|record| record.timestamp >= cutoff);
        Ok((before - records.len()) as u64)
    }
}

/// Test double that fails a fixed number of appends before recovering.
#[derive(Default)]
pub struct FlakyAuditStore {
    inner: MemoryAuditStore,
    failures_remaining: Mutex<u32>,
}

impl FlakyAuditStore {
    /// Fail the next `failures` appends, then behave like a memory store.
    pub fn failing(failures: u32) -> Self {
        Self {
            inner: MemoryAuditStore::new(),
            failures_remaining: Mutex::new(failures),
        }
    }

    /// Snapshot of successfully appended records.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.inner.records()
    }
}

#[async_trait]
impl AuditStore for FlakyAuditStore {
    async fn append(&self, record: AuditRecord) -> AccessResult<()> {
        {
            let mut remaining = self.failures_remaining.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AccessError::Store("append unavailable".to_string()));
            }
        }
        self.inner.append(record).await
    }

    async fn records_since(&self, cutoff: DateTime<Utc>) -> AccessResult<Vec<AuditRecord>> {
        self.inner.records_since(cutoff).await
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> AccessResult<u64> {
        self.inner.purge_before(cutoff).await
    }
}
