//! Custodian Core - Access decisions, audit obligations, and anomaly
//! monitoring for student record systems.
//!
//! This crate provides the policy engine behind Custodian deployments.

pub mod audit;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod identity;
pub mod monitor;
pub mod policy;

pub use catalog::{AuditRule, Catalog, ResourceDef};
pub use config::{AccessWindows, HoursWindow, MonitorConfig};
pub use engine::AccessEngine;
pub use error::{AccessError, AccessResult};
pub use evaluator::{
    AccessDecision, DecisionEffect, OwnershipResolver, PredicateEvaluator, StaticOwnership,
};
pub use identity::{Identity, MemorySessionStore, Role, SessionResolver};
pub use policy::{
    ColumnMasker, ColumnRule, Effect, MaskingStrategy, Operation, OperationSet, PolicyRegistry,
    PolicyRule, PredicateTemplate,
};

// Audit exports
pub use audit::{
    AccessOutcome, AuditKind, AuditObligationEngine, AuditRecord, AuditStore, ChangeSummary,
    MemoryAuditStore, RetryPolicy,
};

// Monitor exports
pub use monitor::{
    Alert, AlertKind, AlertSink, AnomalyMonitor, MemoryAlertSink, Resolution, Severity,
};

/// Re-export protocol types.
pub use custodian_proto as proto;
