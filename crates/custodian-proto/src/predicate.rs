//! Concrete row-filter predicates.
//!
//! A `Predicate` is the boolean condition the query layer applies per record
//! to restrict a result set to authorized rows. Predicates are produced by
//! the custodian evaluator with all identity parameters already bound to
//! literal values; the query layer never sees template placeholders.

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// A row-filter predicate over record field values.
///
/// Note: this type uses serde for serialization due to recursive structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Field equals a literal value.
    Eq {
        /// Field name in the record.
        column: String,
        /// Literal comparison value.
        value: Value,
    },
    /// Field does not equal a literal value.
    Ne {
        /// Field name in the record.
        column: String,
        /// Literal comparison value.
        value: Value,
    },
    /// Field is one of the listed values.
    In {
        /// Field name in the record.
        column: String,
        /// Allowed values.
        values: Vec<Value>,
    },
    /// All conditions must hold.
    And(Vec<Predicate>),
    /// At least one condition must hold.
    Or(Vec<Predicate>),
    /// Matches every row (no restriction).
    True,
    /// Matches no rows (deny all).
    False,
}

impl Predicate {
    /// Create an equality predicate.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Create an inequality predicate.
    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Ne {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Create a membership predicate.
    pub fn in_values(column: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::In {
            column: column.into(),
            values,
        }
    }

    /// Create an AND combination.
    pub fn and(predicates: Vec<Predicate>) -> Self {
        Predicate::And(predicates)
    }

    /// Create an OR combination.
    pub fn or(predicates: Vec<Predicate>) -> Self {
        Predicate::Or(predicates)
    }

    /// Check whether this predicate can match any row at all.
    ///
    /// Used by callers to reject mutations outright instead of running a
    /// query that cannot touch anything.
    pub fn is_deny_all(&self) -> bool {
        match self {
            Predicate::False => true,
            Predicate::In { values, .. } => values.is_empty(),
            Predicate::And(ps) => ps.iter().any(|p| p.is_deny_all()),
            Predicate::Or(ps) => !ps.is_empty() && ps.iter().all(|p| p.is_deny_all()),
            _ => false,
        }
    }

    /// Evaluate the predicate against a row of field values.
    ///
    /// Returns `true` if the row matches. Missing fields never match an
    /// `Eq`/`In` condition (absent data is treated as unauthorized).
    pub fn matches(&self, row: &[(String, Value)]) -> bool {
        match self {
            Predicate::Eq { column, value } => {
                field_value(row, column).map(|v| v == value).unwrap_or(false)
            }
            Predicate::Ne { column, value } => {
                field_value(row, column).map(|v| v != value).unwrap_or(false)
            }
            Predicate::In { column, values } => field_value(row, column)
                .map(|v| values.iter().any(|allowed| allowed == v))
                .unwrap_or(false),
            Predicate::And(predicates) => predicates.iter().all(|p| p.matches(row)),
            Predicate::Or(predicates) => predicates.iter().any(|p| p.matches(row)),
            Predicate::True => true,
            Predicate::False => false,
        }
    }
}

fn field_value<'a>(row: &'a [(String, Value)], column: &str) -> Option<&'a Value> {
    row.iter()
        .find(|(name, _)| name == column)
        .map(|(_, value)| value)
}
