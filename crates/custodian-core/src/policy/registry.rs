//! Policy registry.
//!
//! Read-mostly store for policy rules and column sensitivity rules. Writes
//! happen at configuration time; lookups run concurrently from every request
//! path without taking a write lock.

use super::masking::{ColumnRule, MaskingStrategy};
use super::rule::{Operation, PolicyRule};
use crate::catalog::Catalog;
use crate::error::{AccessError, AccessResult};
use crate::identity::Role;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Registry of policy rules and column rules.
#[derive(Default)]
pub struct PolicyRegistry {
    catalog: Option<Arc<Catalog>>,
    rules: RwLock<HashMap<(String, Role), Vec<PolicyRule>>>,
    column_rules: RwLock<HashMap<String, Vec<ColumnRule>>>,
}

impl PolicyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that validates rule resources against a catalog.
    ///
    /// A rule naming a resource the catalog does not declare is rejected at
    /// registration time; such a rule could never match and a typo'd name
    /// would otherwise sit silently in the registry.
    pub fn with_catalog(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog: Some(catalog),
            ..Self::default()
        }
    }

    fn check_resource(&self, resource: &str) -> AccessResult<()> {
        match &self.catalog {
            Some(catalog) if catalog.get(resource).is_none() => {
                Err(AccessError::UnknownResource(resource.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Register a policy rule.
    ///
    /// Re-registering a structurally identical rule is a no-op. A different
    /// rule whose operation set overlaps an existing rule for the same
    /// (resource, role) is rejected, which keeps the at-most-one-match
    /// invariant decidable.
    pub fn register(&self, rule: PolicyRule) -> AccessResult<()> {
        self.check_resource(&rule.resource)?;
        if rule.operations.is_empty() {
            return Err(AccessError::ConfigurationConflict {
                resource: rule.resource.clone(),
                role: rule.role,
                detail: "rule covers no operations".to_string(),
            });
        }

        let key = (rule.resource.clone(), rule.role);
        let mut rules = self.rules.write();
        let entry = rules.entry(key).or_default();

        for existing in entry.iter() {
            if *existing == rule {
                // Idempotent re-registration
                return Ok(());
            }
            if existing.operations.intersects(&rule.operations) {
                return Err(AccessError::ConfigurationConflict {
                    resource: rule.resource.clone(),
                    role: rule.role,
                    detail: format!(
                        "operation overlap with an existing rule covering {}",
                        existing
                            .operations
                            .iter()
                            .map(|op| op.to_string())
                            .collect::<Vec<_>>()
                            .join(",")
                    ),
                });
            }
        }

        tracing::debug!(
            resource = %rule.resource,
            role = %rule.role,
            "registered policy rule"
        );
        entry.push(rule);
        Ok(())
    }

    /// Look up the rule matching (resource, operation, role).
    ///
    /// Deterministic and side-effect free. At most one rule can match
    /// because registration rejects operation overlap.
    pub fn lookup(&self, resource: &str, operation: Operation, role: Role) -> Option<PolicyRule> {
        let rules = self.rules.read();
        rules
            .get(&(resource.to_string(), role))?
            .iter()
            .find(|rule| rule.applies_to(operation))
            .cloned()
    }

    /// Register a column sensitivity rule.
    ///
    /// Identical re-registration is a no-op. Conflicting rules for the same
    /// column are retained; the evaluator resolves them fail-closed.
    pub fn register_column_rule(&self, rule: ColumnRule) -> AccessResult<()> {
        self.check_resource(&rule.resource)?;
        let mut column_rules = self.column_rules.write();
        let entry = column_rules.entry(rule.resource.clone()).or_default();
        if entry.iter().any(|existing| *existing == rule) {
            return Ok(());
        }
        entry.push(rule);
        Ok(())
    }

    /// Compute the masked columns for a role on a resource.
    ///
    /// A column is masked if ANY rule for it excludes the role (most
    /// restrictive wins); when several rules mask the same column with
    /// different strategies, the most restrictive strategy applies.
    pub fn masked_columns(&self, resource: &str, role: Role) -> BTreeMap<String, MaskingStrategy> {
        let column_rules = self.column_rules.read();
        let mut masked: BTreeMap<String, MaskingStrategy> = BTreeMap::new();

        let Some(rules) = column_rules.get(resource) else {
            return masked;
        };

        for rule in rules {
            if rule.visible_to(role) {
                continue;
            }
            match masked.get(&rule.column) {
                Some(current)
                    if current.restrictiveness() >= rule.masking.restrictiveness() => {}
                _ => {
                    masked.insert(rule.column.clone(), rule.masking.clone());
                }
            }
        }

        masked
    }
}
