//! Custodian decision IR.
//!
//! This crate defines the types the custodian engine hands to the query
//! layer that actually touches the row store:
//!
//! - [`value`] - Runtime value types for predicate parameters and row data
//! - [`predicate`] - Concrete row-filter predicates
//!
//! Predicates are a closed expression tree built only from typed
//! constructors. There is deliberately no way to embed a raw expression
//! string, so an untrusted caller cannot smuggle query fragments into a
//! filter.

pub mod predicate;
pub mod value;

pub use predicate::Predicate;
pub use value::Value;
