//! The scan driver.
//!
//! Pulls a trailing window of audit records, runs every check, and delivers
//! one alert per tripped check. Scans are stateless; only delivered alerts
//! (via the sink) persist between runs.

use super::alert::{Alert, AlertSink};
use super::checks::{self, Finding};
use crate::audit::AuditStore;
use crate::catalog::Catalog;
use crate::config::MonitorConfig;
use crate::error::AccessResult;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Periodic anomaly scanner over the audit stream.
pub struct AnomalyMonitor {
    catalog: Arc<Catalog>,
    store: Arc<dyn AuditStore>,
    sink: Arc<dyn AlertSink>,
    config: MonitorConfig,
    next_id: AtomicU64,
}

impl AnomalyMonitor {
    /// Create a monitor.
    pub fn new(
        catalog: Arc<Catalog>,
        store: Arc<dyn AuditStore>,
        sink: Arc<dyn AlertSink>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            sink,
            config,
            next_id: AtomicU64::new(1),
        }
    }

    /// Run one scan over the trailing window ending at `now`.
    ///
    /// Returns the alerts delivered by this scan. Cancellation observed
    /// before delivery begins discards the findings and nothing reaches the
    /// sink; once delivery starts the scan commits and emits every finding,
    /// so the sink never holds a partial scan.
    pub async fn scan(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> AccessResult<Vec<Alert>> {
        if cancel.is_cancelled() {
            return Ok(Vec::new());
        }

        let window_start = now - ChronoDuration::seconds(self.config.scan_window_secs as i64);
        let records = self.store.records_since(window_start).await?;

        tracing::debug!(
            records = records.len(),
            window_start = %window_start,
            "anomaly scan started"
        );

        let findings = checks::run_all(&records, &self.catalog, &self.config);

        let mut to_deliver = Vec::new();
        for finding in findings {
            if self.config.cooldown_enabled
                && self
                    .sink
                    .has_unresolved(finding.kind, finding.severity)
                    .await?
            {
                tracing::debug!(kind = %finding.kind, "suppressed by cool-down");
                continue;
            }
            to_deliver.push(finding);
        }

        // Single commit point: a cancellation observed here discards the
        // whole scan. Past it, every finding is delivered, so the sink never
        // sees part of a scan.
        if cancel.is_cancelled() {
            tracing::debug!("scan cancelled, discarding findings");
            return Ok(Vec::new());
        }

        let mut delivered = Vec::new();
        for finding in to_deliver {
            let alert = self.raise(finding, now, window_start);
            tracing::warn!(
                id = alert.id,
                kind = %alert.kind,
                severity = %alert.severity,
                observed = alert.observed,
                "anomaly alert raised"
            );
            self.sink.append(alert.clone()).await?;
            delivered.push(alert);
        }

        Ok(delivered)
    }

    /// Scan on a fixed cadence until cancelled.
    pub async fn run(&self, cadence: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(cadence);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so the first scan covers
        // a full cadence of records.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("anomaly monitor stopping");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(error) = self.scan(Utc::now(), &cancel).await {
                        tracing::error!(%error, "anomaly scan failed");
                    }
                }
            }
        }
    }

    /// Mark a delivered alert resolved.
    pub async fn resolve_alert(&self, id: u64, by: &str) -> AccessResult<bool> {
        let resolved = self.sink.mark_resolved(id, by).await?;
        if resolved {
            tracing::info!(id, by, "alert resolved");
        }
        Ok(resolved)
    }

    fn raise(&self, finding: Finding, now: DateTime<Utc>, window_start: DateTime<Utc>) -> Alert {
        Alert {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            kind: finding.kind,
            severity: finding.severity,
            raised_at: now,
            window_start,
            observed: finding.observed,
            threshold: finding.threshold,
            detail: finding.detail,
            resolution: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditKind, AuditRecord, MemoryAuditStore};
    use crate::catalog::ResourceDef;
    use crate::monitor::alert::{AlertKind, MemoryAlertSink, Severity};

    fn failed_auth(seq: u64, timestamp: DateTime<Utc>) -> AuditRecord {
        AuditRecord {
            seq,
            timestamp,
            identity_id: "tok-x".to_string(),
            role: None,
            kind: AuditKind::Authentication {
                success: false,
                detail: None,
            },
        }
    }

    fn monitor(
        store: Arc<MemoryAuditStore>,
        sink: Arc<MemoryAlertSink>,
        config: MonitorConfig,
    ) -> AnomalyMonitor {
        let catalog = Arc::new(Catalog::from_resources([
            ResourceDef::new("Grades").grade_bearing(),
        ]));
        AnomalyMonitor::new(catalog, store, sink, config)
    }

    async fn seed_failed_logins(store: &MemoryAuditStore, count: u64, at: DateTime<Utc>) {
        for seq in 0..count {
            store.append(failed_auth(seq, at)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_scan_raises_one_alert_per_tripped_check() {
        let store = Arc::new(MemoryAuditStore::new());
        let sink = Arc::new(MemoryAlertSink::new());
        let monitor = monitor(store.clone(), sink.clone(), MonitorConfig::default());

        let now = Utc::now();
        seed_failed_logins(&store, 6, now).await;

        let delivered = monitor.scan(now, &CancellationToken::new()).await.unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].kind, AlertKind::FailedLogins);
        assert_eq!(delivered[0].severity, Severity::High);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_records_outside_window_ignored() {
        let store = Arc::new(MemoryAuditStore::new());
        let sink = Arc::new(MemoryAlertSink::new());
        let monitor = monitor(store.clone(), sink.clone(), MonitorConfig::default());

        let now = Utc::now();
        seed_failed_logins(&store, 6, now - ChronoDuration::hours(2)).await;

        let delivered = monitor.scan(now, &CancellationToken::new()).await.unwrap();
        assert!(delivered.is_empty());
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_scans_without_cooldown_re_raise() {
        let store = Arc::new(MemoryAuditStore::new());
        let sink = Arc::new(MemoryAlertSink::new());
        let monitor = monitor(store.clone(), sink.clone(), MonitorConfig::default());

        let now = Utc::now();
        seed_failed_logins(&store, 6, now).await;

        let cancel = CancellationToken::new();
        monitor.scan(now, &cancel).await.unwrap();
        monitor.scan(now, &cancel).await.unwrap();
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_unresolved_duplicate() {
        let store = Arc::new(MemoryAuditStore::new());
        let sink = Arc::new(MemoryAlertSink::new());
        let config = MonitorConfig::default().with_cooldown(true);
        let monitor = monitor(store.clone(), sink.clone(), config);

        let now = Utc::now();
        seed_failed_logins(&store, 6, now).await;

        let cancel = CancellationToken::new();
        let first = monitor.scan(now, &cancel).await.unwrap();
        assert_eq!(first.len(), 1);
        let second = monitor.scan(now, &cancel).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(sink.len(), 1);

        // Resolving clears the suppression
        assert!(monitor.resolve_alert(first[0].id, "sec-admin").await.unwrap());
        let third = monitor.scan(now, &cancel).await.unwrap();
        assert_eq!(third.len(), 1);
        assert_eq!(sink.len(), 2);
    }

    struct CancellingSink {
        inner: MemoryAlertSink,
        cancel: CancellationToken,
    }

    #[async_trait::async_trait]
    impl crate::monitor::alert::AlertSink for CancellingSink {
        async fn append(&self, alert: Alert) -> crate::error::AccessResult<()> {
            self.cancel.cancel();
            self.inner.append(alert).await
        }

        async fn mark_resolved(&self, id: u64, by: &str) -> crate::error::AccessResult<bool> {
            self.inner.mark_resolved(id, by).await
        }

        async fn has_unresolved(
            &self,
            kind: AlertKind,
            severity: Severity,
        ) -> crate::error::AccessResult<bool> {
            self.inner.has_unresolved(kind, severity).await
        }
    }

    #[tokio::test]
    async fn test_cancel_during_delivery_still_emits_every_alert() {
        let store = Arc::new(MemoryAuditStore::new());
        let cancel = CancellationToken::new();
        let sink = Arc::new(CancellingSink {
            inner: MemoryAlertSink::new(),
            cancel: cancel.clone(),
        });
        let catalog = Arc::new(Catalog::from_resources([
            ResourceDef::new("Grades").grade_bearing(),
        ]));
        let monitor =
            AnomalyMonitor::new(catalog, store.clone(), sink.clone(), MonitorConfig::default());

        // Trip two checks so delivery spans more than one append
        let now = Utc::now();
        seed_failed_logins(&store, 6, now).await;
        store
            .append(AuditRecord {
                seq: 100,
                timestamp: now,
                identity_id: "a-1".to_string(),
                role: Some(crate::identity::Role::Admin),
                kind: AuditKind::PrivilegeChange {
                    subject: "t-200".to_string(),
                    detail: "granted registrar".to_string(),
                },
            })
            .await
            .unwrap();

        // The first append cancels the token; the scan has already committed
        // and must emit both alerts, not leave one stranded in the sink.
        let delivered = monitor.scan(now, &cancel).await.unwrap();
        assert_eq!(delivered.len(), 2);
        assert_eq!(sink.inner.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_scan_delivers_nothing() {
        let store = Arc::new(MemoryAuditStore::new());
        let sink = Arc::new(MemoryAlertSink::new());
        let monitor = monitor(store.clone(), sink.clone(), MonitorConfig::default());

        let now = Utc::now();
        seed_failed_logins(&store, 6, now).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let delivered = monitor.scan(now, &cancel).await.unwrap();
        assert!(delivered.is_empty());
        assert!(sink.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_scans_on_cadence_and_stops() {
        let store = Arc::new(MemoryAuditStore::new());
        let sink = Arc::new(MemoryAlertSink::new());
        let monitor = Arc::new(monitor(store.clone(), sink.clone(), MonitorConfig::default()));

        seed_failed_logins(&store, 6, Utc::now()).await;

        let cancel = CancellationToken::new();
        let handle = {
            let monitor = monitor.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { monitor.run(Duration::from_secs(60), cancel).await })
        };

        tokio::time::sleep(Duration::from_secs(130)).await;
        cancel.cancel();
        handle.await.unwrap();

        // Two cadence ticks elapsed, two scans ran
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn test_alert_ids_are_unique() {
        let store = Arc::new(MemoryAuditStore::new());
        let sink = Arc::new(MemoryAlertSink::new());
        let monitor = monitor(store.clone(), sink.clone(), MonitorConfig::default());

        let now = Utc::now();
        seed_failed_logins(&store, 6, now).await;
        // Trip a second check too
        store
            .append(AuditRecord {
                seq: 100,
                timestamp: now,
                identity_id: "a-1".to_string(),
                role: Some(crate::identity::Role::Admin),
                kind: AuditKind::PrivilegeChange {
                    subject: "t-200".to_string(),
                    detail: "granted registrar".to_string(),
                },
            })
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        monitor.scan(now, &cancel).await.unwrap();
        monitor.scan(now, &cancel).await.unwrap();

        let mut ids: Vec<_> = sink.alerts().iter().map(|alert| alert.id).collect();
        assert_eq!(ids.len(), 4);
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }
}
