//! Resource catalog.
//!
//! Static description of the record collections the engine makes decisions
//! about: their sensitive columns, their audit obligations per operation,
//! and the designations the anomaly monitor keys on. Loaded once at startup.

use crate::policy::Operation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Audit obligation for one operation on a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditRule {
    /// Every access is recorded, allowed or denied.
    Always,
    /// Recorded only when any of the listed columns is touched.
    WhenColumnsTouched(BTreeSet<String>),
    /// Never recorded.
    Never,
}

impl Default for AuditRule {
    fn default() -> Self {
        AuditRule::Never
    }
}

impl AuditRule {
    /// Whether an access touching the given columns is obliged to be recorded.
    pub fn obliges(&self, touched_columns: &[String]) -> bool {
        match self {
            AuditRule::Always => true,
            AuditRule::WhenColumnsTouched(watched) => {
                touched_columns.iter().any(|column| watched.contains(column))
            }
            AuditRule::Never => false,
        }
    }
}

/// Definition of a record collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
    /// Resource name (e.g., "Students").
    pub name: String,
    /// Columns declared sensitive.
    pub sensitive_columns: BTreeSet<String>,
    /// Audit obligation per operation.
    pub audit: HashMap<Operation, AuditRule>,
    /// Whether mutations here count toward the grade-change anomaly check.
    pub grade_bearing: bool,
    /// Whether reads here count toward the sensitive-read anomaly check.
    pub sensitive: bool,
}

impl ResourceDef {
    /// Create a resource definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sensitive_columns: BTreeSet::new(),
            audit: HashMap::new(),
            grade_bearing: false,
            sensitive: false,
        }
    }

    /// Declare a sensitive column.
    pub fn with_sensitive_column(mut self, column: impl Into<String>) -> Self {
        self.sensitive_columns.insert(column.into());
        self
    }

    /// Set the audit rule for one operation.
    pub fn with_audit(mut self, operation: Operation, rule: AuditRule) -> Self {
        self.audit.insert(operation, rule);
        self
    }

    /// Set the audit rule for every operation.
    pub fn with_audit_always(mut self) -> Self {
        for operation in [
            Operation::Read,
            Operation::Insert,
            Operation::Update,
            Operation::Delete,
        ] {
            self.audit.insert(operation, AuditRule::Always);
        }
        self
    }

    /// Mark as grade-bearing for anomaly monitoring.
    pub fn grade_bearing(mut self) -> Self {
        self.grade_bearing = true;
        self
    }

    /// Mark as sensitive for anomaly monitoring.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Audit rule for the given operation (`Never` when undeclared).
    pub fn audit_rule(&self, operation: Operation) -> AuditRule {
        self.audit.get(&operation).cloned().unwrap_or_default()
    }
}

/// The set of resources the engine knows about.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    resources: HashMap<String, ResourceDef>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from definitions.
    pub fn from_resources(resources: impl IntoIterator<Item = ResourceDef>) -> Self {
        Self {
            resources: resources
                .into_iter()
                .map(|def| (def.name.clone(), def))
                .collect(),
        }
    }

    /// Add a resource definition.
    pub fn insert(&mut self, def: ResourceDef) {
        self.resources.insert(def.name.clone(), def);
    }

    /// Look up a resource definition.
    pub fn get(&self, name: &str) -> Option<&ResourceDef> {
        self.resources.get(name)
    }

    /// Whether the named resource is grade-bearing.
    pub fn is_grade_bearing(&self, name: &str) -> bool {
        self.get(name).map(|def| def.grade_bearing).unwrap_or(false)
    }

    /// Whether the named resource is designated sensitive.
    pub fn is_sensitive(&self, name: &str) -> bool {
        self.get(name).map(|def| def.sensitive).unwrap_or(false)
    }
}
