//! Policy definitions and the registry that holds them.
//!
//! A policy rule binds a (resource, operation set, role) triple to an
//! effect: unrestricted access, a row-filter predicate template, or denial.
//! The registry enforces the at-most-one-match invariant at registration
//! time so lookup never has to break ties.

pub mod masking;
pub mod registry;
pub mod rule;

pub use masking::{ColumnMasker, ColumnRule, MaskingStrategy};
pub use registry::PolicyRegistry;
pub use rule::{Effect, Operation, OperationSet, PolicyRule, PredicateTemplate};
