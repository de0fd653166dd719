//! Policy rule definitions.

use crate::identity::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Operations a rule can apply to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Operation {
    /// Read operations (SELECT).
    Read,
    /// Insert operations.
    Insert,
    /// Update operations.
    Update,
    /// Delete operations.
    Delete,
}

impl Operation {
    /// Whether this operation mutates rows.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Operation::Read)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Read => write!(f, "read"),
            Operation::Insert => write!(f, "insert"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// An ordered, deduplicated set of operations.
///
/// Ordered storage makes structurally identical rules compare equal, which
/// the registry relies on for idempotent re-registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSet(BTreeSet<Operation>);

impl OperationSet {
    /// Create a set from the given operations.
    pub fn new(operations: impl IntoIterator<Item = Operation>) -> Self {
        Self(operations.into_iter().collect())
    }

    /// The set of all four operations.
    pub fn all() -> Self {
        Self::new([
            Operation::Read,
            Operation::Insert,
            Operation::Update,
            Operation::Delete,
        ])
    }

    /// A read-only set.
    pub fn read_only() -> Self {
        Self::new([Operation::Read])
    }

    /// The mutating operations.
    pub fn mutations() -> Self {
        Self::new([Operation::Insert, Operation::Update, Operation::Delete])
    }

    /// Check membership.
    pub fn contains(&self, operation: Operation) -> bool {
        self.0.contains(&operation)
    }

    /// Check whether any operation is shared with another set.
    pub fn intersects(&self, other: &OperationSet) -> bool {
        self.0.iter().any(|op| other.0.contains(op))
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the operations.
    pub fn iter(&self) -> impl Iterator<Item = Operation> + '_ {
        self.0.iter().copied()
    }
}

/// A predicate template with unbound identity parameters.
///
/// Templates are the only way to express a row filter in a rule. They are
/// instantiated per request by binding identity attributes and ownership
/// data, which rules out string-composed filters by construction.
///
/// Note: this type uses serde for serialization due to recursive structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PredicateTemplate {
    /// Record column equals an identity attribute (e.g., `owner_id = identity.id`).
    ColumnEqualsAttribute {
        /// Column name in the record.
        column: String,
        /// Attribute name on the identity (`id`, `department`).
        attribute: String,
    },
    /// Record column is among the caller's owned resource ids, resolved via
    /// the ownership collaborator at evaluation time.
    ColumnInOwnedResources {
        /// Column name in the record.
        column: String,
    },
    /// Record column equals a literal value.
    ColumnEquals {
        /// Column name in the record.
        column: String,
        /// Literal value.
        value: custodian_proto::Value,
    },
    /// All conditions must hold.
    And(Vec<PredicateTemplate>),
    /// At least one condition must hold.
    Or(Vec<PredicateTemplate>),
    /// Every row matches.
    AllRows,
    /// No row matches.
    NoRows,
}

impl PredicateTemplate {
    /// Create an attribute equality template.
    pub fn column_equals_attribute(
        column: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        PredicateTemplate::ColumnEqualsAttribute {
            column: column.into(),
            attribute: attribute.into(),
        }
    }

    /// Create an ownership membership template.
    pub fn column_in_owned(column: impl Into<String>) -> Self {
        PredicateTemplate::ColumnInOwnedResources {
            column: column.into(),
        }
    }

    /// Create a literal equality template.
    pub fn column_equals(column: impl Into<String>, value: impl Into<custodian_proto::Value>) -> Self {
        PredicateTemplate::ColumnEquals {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// The effect a matching rule has on the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// No row restriction.
    Unrestricted,
    /// Rows restricted by the instantiated template.
    Filtered(PredicateTemplate),
    /// Request refused entirely.
    Denied,
}

/// A registered policy rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Target resource name.
    pub resource: String,
    /// Operations this rule covers.
    pub operations: OperationSet,
    /// Role this rule applies to.
    pub role: Role,
    /// Effect when the rule matches.
    pub effect: Effect,
}

impl PolicyRule {
    /// Create a new rule.
    pub fn new(
        resource: impl Into<String>,
        operations: OperationSet,
        role: Role,
        effect: Effect,
    ) -> Self {
        Self {
            resource: resource.into(),
            operations,
            role,
            effect,
        }
    }

    /// Create an unrestricted rule for all operations.
    pub fn unrestricted(resource: impl Into<String>, role: Role) -> Self {
        Self::new(resource, OperationSet::all(), role, Effect::Unrestricted)
    }

    /// Create a filtered rule.
    pub fn filtered(
        resource: impl Into<String>,
        operations: OperationSet,
        role: Role,
        template: PredicateTemplate,
    ) -> Self {
        Self::new(resource, operations, role, Effect::Filtered(template))
    }

    /// Create an explicit denial rule.
    pub fn denied(resource: impl Into<String>, operations: OperationSet, role: Role) -> Self {
        Self::new(resource, operations, role, Effect::Denied)
    }

    /// Check if this rule applies to the given operation.
    pub fn applies_to(&self, operation: Operation) -> bool {
        self.operations.contains(operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_set_dedup_and_order() {
        let a = OperationSet::new([Operation::Update, Operation::Read, Operation::Read]);
        let b = OperationSet::new([Operation::Read, Operation::Update]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_operation_set_intersects() {
        let reads = OperationSet::read_only();
        let writes = OperationSet::mutations();
        assert!(!reads.intersects(&writes));
        assert!(OperationSet::all().intersects(&reads));
        assert!(writes.contains(Operation::Delete));
        assert!(!writes.contains(Operation::Read));
    }

    #[test]
    fn test_rule_applies_to() {
        let rule = PolicyRule::filtered(
            "Students",
            OperationSet::read_only(),
            Role::Teacher,
            PredicateTemplate::column_in_owned("course_id"),
        );
        assert!(rule.applies_to(Operation::Read));
        assert!(!rule.applies_to(Operation::Update));
    }

    #[test]
    fn test_identical_rules_compare_equal() {
        let make = || {
            PolicyRule::filtered(
                "Students",
                OperationSet::new([Operation::Read, Operation::Update]),
                Role::Teacher,
                PredicateTemplate::column_in_owned("course_id"),
            )
        };
        assert_eq!(make(), make());
    }

    #[test]
    fn test_rule_serde_round_trip() {
        let rule = PolicyRule::denied("Grades", OperationSet::mutations(), Role::ReadOnly);
        let json = serde_json::to_string(&rule).unwrap();
        let back: PolicyRule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rule);
    }
}
