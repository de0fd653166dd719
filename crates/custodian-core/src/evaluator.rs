//! Predicate evaluator.
//!
//! Turns (identity, resource, operation) into an `AccessDecision`: the
//! row-filter predicate the query layer must apply plus the columns it must
//! mask. Every path without an explicit allow lands on a deny-all filter.

use crate::catalog::Catalog;
use crate::config::AccessWindows;
use crate::error::{AccessError, AccessResult};
use crate::identity::Identity;
use crate::policy::{Effect, MaskingStrategy, Operation, PolicyRegistry, PredicateTemplate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use custodian_proto::{Predicate, Value};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Resolves the resource ids an identity owns (e.g., a teacher's courses).
///
/// External collaborator; the engine only consumes the mapping.
#[async_trait]
pub trait OwnershipResolver: Send + Sync {
    /// The resource ids owned by the identity.
    async fn owned_resource_ids(&self, identity: &Identity) -> AccessResult<BTreeSet<String>>;
}

/// In-memory ownership mapping for tests and embedding.
#[derive(Default)]
pub struct StaticOwnership {
    owned: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl StaticOwnership {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the owned ids for an identity.
    pub fn set(&self, identity_id: impl Into<String>, owned: impl IntoIterator<Item = String>) {
        self.owned
            .write()
            .insert(identity_id.into(), owned.into_iter().collect());
    }
}

#[async_trait]
impl OwnershipResolver for StaticOwnership {
    async fn owned_resource_ids(&self, identity: &Identity) -> AccessResult<BTreeSet<String>> {
        Ok(self
            .owned
            .read()
            .get(&identity.id)
            .cloned()
            .unwrap_or_default())
    }
}

/// How the matched rule restricts the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionEffect {
    /// No row restriction.
    Unrestricted,
    /// Rows restricted by the decision's filter.
    Filtered,
    /// Request must be refused entirely.
    Denied,
}

/// The outcome of evaluating an access request.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessDecision {
    /// How the request is restricted.
    pub effect: DecisionEffect,
    /// Row filter the query layer must apply.
    pub filter: Predicate,
    /// Columns to mask, with their strategies.
    pub masked_columns: BTreeMap<String, MaskingStrategy>,
}

impl AccessDecision {
    fn denied(masked_columns: BTreeMap<String, MaskingStrategy>) -> Self {
        Self {
            effect: DecisionEffect::Denied,
            filter: Predicate::False,
            masked_columns,
        }
    }

    /// Whether the caller must refuse the request outright.
    pub fn is_denied(&self) -> bool {
        self.effect == DecisionEffect::Denied
    }

    /// The names of the masked columns.
    pub fn masked_column_names(&self) -> BTreeSet<String> {
        self.masked_columns.keys().cloned().collect()
    }
}

/// Evaluates access requests against the registry and catalog.
pub struct PredicateEvaluator {
    catalog: Arc<Catalog>,
    registry: Arc<PolicyRegistry>,
    ownership: Arc<dyn OwnershipResolver>,
    windows: AccessWindows,
}

impl PredicateEvaluator {
    /// Create an evaluator.
    pub fn new(
        catalog: Arc<Catalog>,
        registry: Arc<PolicyRegistry>,
        ownership: Arc<dyn OwnershipResolver>,
        windows: AccessWindows,
    ) -> Self {
        Self {
            catalog,
            registry,
            ownership,
            windows,
        }
    }

    /// Evaluate an access request at the given instant.
    ///
    /// Fails with `OutOfWindow` before any row filtering when the role is
    /// time-gated and `now` falls outside its window. Unknown resources and
    /// unmatched (resource, operation, role) triples yield a deny-all
    /// decision, not an error.
    pub async fn evaluate(
        &self,
        identity: &Identity,
        resource: &str,
        operation: Operation,
        now: DateTime<Utc>,
    ) -> AccessResult<AccessDecision> {
        if !self.windows.permits(identity.role, now) {
            return Err(AccessError::OutOfWindow {
                role: identity.role,
                at: now,
            });
        }

        // Masking is independent of the row-filter effect.
        let masked_columns = self.registry.masked_columns(resource, identity.role);

        if self.catalog.get(resource).is_none() {
            tracing::warn!(resource, "access evaluated against unknown resource");
            return Ok(AccessDecision::denied(masked_columns));
        }

        let Some(rule) = self.registry.lookup(resource, operation, identity.role) else {
            tracing::debug!(
                resource,
                %operation,
                role = %identity.role,
                "no matching rule, denying"
            );
            return Ok(AccessDecision::denied(masked_columns));
        };

        let decision = match &rule.effect {
            Effect::Denied => AccessDecision::denied(masked_columns),
            Effect::Unrestricted => AccessDecision {
                effect: DecisionEffect::Unrestricted,
                filter: Predicate::True,
                masked_columns,
            },
            Effect::Filtered(template) => {
                let filter = self.bind(template, identity).await;
                AccessDecision {
                    effect: DecisionEffect::Filtered,
                    filter,
                    masked_columns,
                }
            }
        };

        Ok(decision)
    }

    /// Instantiate a template by binding identity attributes and ownership.
    ///
    /// Binding failures (missing attribute, empty or unavailable ownership)
    /// degrade to a zero-row predicate.
    async fn bind(&self, template: &PredicateTemplate, identity: &Identity) -> Predicate {
        let owned = if template_needs_ownership(template) {
            match self.ownership.owned_resource_ids(identity).await {
                Ok(owned) => owned,
                Err(error) => {
                    tracing::warn!(
                        identity = %identity.id,
                        %error,
                        "ownership lookup unavailable, binding to zero rows"
                    );
                    BTreeSet::new()
                }
            }
        } else {
            BTreeSet::new()
        };

        bind_template(template, identity, &owned)
    }
}

fn template_needs_ownership(template: &PredicateTemplate) -> bool {
    match template {
        PredicateTemplate::ColumnInOwnedResources { .. } => true,
        PredicateTemplate::And(children) | PredicateTemplate::Or(children) => {
            children.iter().any(template_needs_ownership)
        }
        _ => false,
    }
}

fn bind_template(
    template: &PredicateTemplate,
    identity: &Identity,
    owned: &BTreeSet<String>,
) -> Predicate {
    match template {
        PredicateTemplate::ColumnEqualsAttribute { column, attribute } => {
            match identity.attribute(attribute) {
                Some(value) => Predicate::eq(column.clone(), value),
                None => Predicate::False,
            }
        }
        PredicateTemplate::ColumnInOwnedResources { column } => {
            if owned.is_empty() {
                Predicate::False
            } else {
                Predicate::in_values(
                    column.clone(),
                    owned.iter().cloned().map(Value::String).collect(),
                )
            }
        }
        PredicateTemplate::ColumnEquals { column, value } => Predicate::Eq {
            column: column.clone(),
            value: value.clone(),
        },
        PredicateTemplate::And(children) => Predicate::and(
            children
                .iter()
                .map(|child| bind_template(child, identity, owned))
                .collect(),
        ),
        PredicateTemplate::Or(children) => Predicate::or(
            children
                .iter()
                .map(|child| bind_template(child, identity, owned))
                .collect(),
        ),
        PredicateTemplate::AllRows => Predicate::True,
        PredicateTemplate::NoRows => Predicate::False,
    }
}
