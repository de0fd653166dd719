//! Audit obligations and the append-only record stream.

pub mod engine;
pub mod record;
pub mod store;

pub use engine::{AuditObligationEngine, RetryPolicy};
pub use record::{AccessOutcome, AuditKind, AuditRecord, ChangeSummary};
pub use store::{AuditStore, MemoryAuditStore};
