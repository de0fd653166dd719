//! The individual anomaly checks.
//!
//! Each check is a pure function over a window of audit records: no state
//! carries between scans. A check either trips and yields one finding for the
//! whole window, or stays silent.

use super::alert::{AlertKind, Severity};
use crate::audit::AuditRecord;
use crate::catalog::Catalog;
use crate::config::{HoursWindow, MonitorConfig};

/// A tripped check, before it becomes a delivered alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Condition detected.
    pub kind: AlertKind,
    /// Severity to raise at.
    pub severity: Severity,
    /// Observed event count.
    pub observed: u64,
    /// Threshold the count exceeded.
    pub threshold: u64,
    /// Human-readable summary.
    pub detail: String,
}

/// Failed authentication volume. Trips above the threshold.
pub fn failed_logins(records: &[AuditRecord], threshold: u64) -> Option<Finding> {
    let observed = records
        .iter()
        .filter(|record| record.is_failed_authentication())
        .count() as u64;
    (observed > threshold).then(|| Finding {
        kind: AlertKind::FailedLogins,
        severity: Severity::High,
        observed,
        threshold,
        detail: format!("{} failed logins in window (threshold {})", observed, threshold),
    })
}

/// Privilege changes. Any occurrence in the window trips.
pub fn privilege_changes(records: &[AuditRecord]) -> Option<Finding> {
    let observed = records
        .iter()
        .filter(|record| record.is_privilege_change())
        .count() as u64;
    (observed > 0).then(|| Finding {
        kind: AlertKind::PrivilegeChange,
        severity: Severity::High,
        observed,
        threshold: 0,
        detail: format!("{} privilege changes in window", observed),
    })
}

/// Access volume outside allowed hours. Trips above the threshold.
pub fn off_hours_access(
    records: &[AuditRecord],
    allowed_hours: &HoursWindow,
    threshold: u64,
) -> Option<Finding> {
    let observed = records
        .iter()
        .filter(|record| record.access().is_some() && !allowed_hours.contains(record.timestamp))
        .count() as u64;
    (observed > threshold).then(|| Finding {
        kind: AlertKind::OffHoursAccess,
        severity: Severity::Medium,
        observed,
        threshold,
        detail: format!(
            "{} accesses outside allowed hours (threshold {})",
            observed, threshold
        ),
    })
}

/// Mutation volume on grade-bearing resources. Trips above the threshold.
/// Denied attempts count; a burst of refused writes is as suspicious as a
/// burst of applied ones.
pub fn excessive_grade_changes(
    records: &[AuditRecord],
    catalog: &Catalog,
    threshold: u64,
) -> Option<Finding> {
    let observed = records
        .iter()
        .filter(|record| match record.access() {
            Some((resource, operation)) => {
                operation.is_mutation() && catalog.is_grade_bearing(resource)
            }
            None => false,
        })
        .count() as u64;
    (observed > threshold).then(|| Finding {
        kind: AlertKind::ExcessiveGradeChanges,
        severity: Severity::High,
        observed,
        threshold,
        detail: format!(
            "{} grade-bearing mutations in window (threshold {})",
            observed, threshold
        ),
    })
}

/// Read volume on sensitive resources. Trips above the threshold.
pub fn sensitive_read_volume(
    records: &[AuditRecord],
    catalog: &Catalog,
    threshold: u64,
) -> Option<Finding> {
    let observed = records
        .iter()
        .filter(|record| match record.access() {
            Some((resource, operation)) => {
                !operation.is_mutation() && catalog.is_sensitive(resource)
            }
            None => false,
        })
        .count() as u64;
    (observed > threshold).then(|| Finding {
        kind: AlertKind::SensitiveReadVolume,
        severity: Severity::Medium,
        observed,
        threshold,
        detail: format!(
            "{} sensitive-resource reads in window (threshold {})",
            observed, threshold
        ),
    })
}

/// Run every check, in a fixed order.
pub fn run_all(records: &[AuditRecord], catalog: &Catalog, config: &MonitorConfig) -> Vec<Finding> {
    [
        failed_logins(records, config.failed_login_threshold),
        privilege_changes(records),
        off_hours_access(records, &config.allowed_hours, config.off_hours_threshold),
        excessive_grade_changes(records, catalog, config.grade_change_threshold),
        sensitive_read_volume(records, catalog, config.sensitive_read_threshold),
    ]
    .into_iter()
    .flatten()
    .collect()
}
