//! Alert types and the sink collaborator.

use crate::error::AccessResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// The condition a check detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    /// Failed authentication volume exceeded the threshold.
    FailedLogins,
    /// A privilege grant or revoke occurred in the window.
    PrivilegeChange,
    /// Access volume outside allowed hours exceeded the threshold.
    OffHoursAccess,
    /// Grade-bearing mutation volume exceeded the threshold.
    ExcessiveGradeChanges,
    /// Sensitive-resource read volume exceeded the threshold.
    SensitiveReadVolume,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AlertKind::FailedLogins => "failed_logins",
            AlertKind::PrivilegeChange => "privilege_change",
            AlertKind::OffHoursAccess => "off_hours_access",
            AlertKind::ExcessiveGradeChanges => "excessive_grade_changes",
            AlertKind::SensitiveReadVolume => "sensitive_read_volume",
        };
        write!(f, "{}", name)
    }
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

/// Who resolved an alert, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Resolving principal.
    pub by: String,
    /// When the alert was resolved.
    pub at: DateTime<Utc>,
}

/// A raised anomaly alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Monitor-assigned id, unique per process.
    pub id: u64,
    /// Detected condition.
    pub kind: AlertKind,
    /// Severity of the condition.
    pub severity: Severity,
    /// When the scan raised the alert.
    pub raised_at: DateTime<Utc>,
    /// Start of the window the scan covered.
    pub window_start: DateTime<Utc>,
    /// Observed event count.
    pub observed: u64,
    /// Threshold the count exceeded.
    pub threshold: u64,
    /// Human-readable summary.
    pub detail: String,
    /// Set once an operator resolves the alert.
    pub resolution: Option<Resolution>,
}

impl Alert {
    /// Whether the alert is still open.
    pub fn is_unresolved(&self) -> bool {
        self.resolution.is_none()
    }
}

/// Destination for raised alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver a raised alert.
    async fn append(&self, alert: Alert) -> AccessResult<()>;

    /// Mark an alert resolved. Returns false when the id is unknown or the
    /// alert was already resolved.
    async fn mark_resolved(&self, id: u64, by: &str) -> AccessResult<bool>;

    /// Whether an unresolved alert with this kind and severity exists.
    async fn has_unresolved(&self, kind: AlertKind, severity: Severity) -> AccessResult<bool>;
}

/// In-memory alert sink for tests and embedding.
#[derive(Default)]
pub struct MemoryAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl MemoryAlertSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every delivered alert.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    /// Number of delivered alerts.
    pub fn len(&self) -> usize {
        self.alerts.lock().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.alerts.lock().is_empty()
    }
}

#[async_trait]
impl AlertSink for MemoryAlertSink {
    async fn append(&self, alert: Alert) -> AccessResult<()> {
        self.alerts.lock().push(alert);
        Ok(())
    }

    async fn mark_resolved(&self, id: u64, by: &str) -> AccessResult<bool> {
        let mut alerts = self.alerts.lock();
        match alerts
            .iter_mut()
            .find(|alert| alert.id == id && alert.is_unresolved())
        {
            Some(alert) => {
                alert.resolution = Some(Resolution {
                    by: by.to_string(),
                    at: Utc::now(),
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn has_unresolved(&self, kind: AlertKind, severity: Severity) -> AccessResult<bool> {
        Ok(self
            .alerts
            .lock()
            .iter()
            .any(|alert| alert.kind == kind && alert.severity == severity && alert.is_unresolved()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(id: u64, kind: AlertKind, severity: Severity) -> Alert {
        Alert {
            id,
            kind,
            severity,
            raised_at: Utc::now(),
            window_start: Utc::now(),
            observed: 7,
            threshold: 5,
            detail: "test".to_string(),
            resolution: None,
        }
    }

    #[tokio::test]
    async fn test_resolution_lifecycle() {
        let sink = MemoryAlertSink::new();
        sink.append(alert(1, AlertKind::FailedLogins, Severity::High))
            .await
            .unwrap();

        assert!(sink
            .has_unresolved(AlertKind::FailedLogins, Severity::High)
            .await
            .unwrap());
        assert!(sink.mark_resolved(1, "sec-admin").await.unwrap());
        assert!(!sink
            .has_unresolved(AlertKind::FailedLogins, Severity::High)
            .await
            .unwrap());

        // Second resolve of the same alert is a no-op
        assert!(!sink.mark_resolved(1, "sec-admin").await.unwrap());
        // Unknown id
        assert!(!sink.mark_resolved(99, "sec-admin").await.unwrap());

        let resolved = &sink.alerts()[0];
        assert_eq!(resolved.resolution.as_ref().unwrap().by, "sec-admin");
    }

    #[tokio::test]
    async fn test_unresolved_match_is_exact() {
        let sink = MemoryAlertSink::new();
        sink.append(alert(1, AlertKind::OffHoursAccess, Severity::Medium))
            .await
            .unwrap();

        assert!(!sink
            .has_unresolved(AlertKind::OffHoursAccess, Severity::High)
            .await
            .unwrap());
        assert!(!sink
            .has_unresolved(AlertKind::FailedLogins, Severity::Medium)
            .await
            .unwrap());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }
}
