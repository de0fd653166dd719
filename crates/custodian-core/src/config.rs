//! Engine configuration.

use crate::identity::Role;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Default failed-login alert threshold.
pub const DEFAULT_FAILED_LOGIN_THRESHOLD: u64 = 5;

/// Default off-hours access alert threshold.
pub const DEFAULT_OFF_HOURS_THRESHOLD: u64 = 10;

/// Default grade-change alert threshold.
pub const DEFAULT_GRADE_CHANGE_THRESHOLD: u64 = 20;

/// Default sensitive-read alert threshold.
pub const DEFAULT_SENSITIVE_READ_THRESHOLD: u64 = 100;

/// Default anomaly scan window in seconds (1 hour).
pub const DEFAULT_SCAN_WINDOW_SECS: u64 = 3600;

/// A daily time window.
///
/// Windows may wrap midnight (`start > end` means "overnight").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoursWindow {
    /// Inclusive start of the window.
    pub start: NaiveTime,
    /// Exclusive end of the window.
    pub end: NaiveTime,
}

impl HoursWindow {
    /// Create a window.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Business hours 07:00-18:00.
    pub fn business_hours() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }

    /// Whether the instant falls inside the window.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let time = at.time();
        if self.start <= self.end {
            time >= self.start && time < self.end
        } else {
            // Overnight window
            time >= self.start || time < self.end
        }
    }
}

/// Per-role access validity windows.
///
/// Roles without an entry are not time-gated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessWindows {
    windows: HashMap<Role, HoursWindow>,
}

impl AccessWindows {
    /// Create an empty (ungated) configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate a role to a window.
    pub fn with_window(mut self, role: Role, window: HoursWindow) -> Self {
        self.windows.insert(role, window);
        self
    }

    /// The window configured for a role, if any.
    pub fn window_for(&self, role: Role) -> Option<&HoursWindow> {
        self.windows.get(&role)
    }

    /// Whether the role may act at the given instant.
    pub fn permits(&self, role: Role, at: DateTime<Utc>) -> bool {
        match self.windows.get(&role) {
            Some(window) => window.contains(at),
            None => true,
        }
    }
}

/// Anomaly monitor configuration.
///
/// Thresholds are configuration, never hard-coded in the checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Failed logins in-window above this count raise a High alert.
    pub failed_login_threshold: u64,
    /// Off-hours accesses in-window above this count raise a Medium alert.
    pub off_hours_threshold: u64,
    /// Grade mutations in-window above this count raise a High alert.
    pub grade_change_threshold: u64,
    /// Sensitive-resource reads in-window above this count raise a Medium alert.
    pub sensitive_read_threshold: u64,
    /// Hours considered "on-hours" for the off-hours check.
    pub allowed_hours: HoursWindow,
    /// Trailing window each scan covers, in seconds.
    pub scan_window_secs: u64,
    /// Suppress re-raising an identical unresolved (kind, severity) alert.
    pub cooldown_enabled: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            failed_login_threshold: DEFAULT_FAILED_LOGIN_THRESHOLD,
            off_hours_threshold: DEFAULT_OFF_HOURS_THRESHOLD,
            grade_change_threshold: DEFAULT_GRADE_CHANGE_THRESHOLD,
            sensitive_read_threshold: DEFAULT_SENSITIVE_READ_THRESHOLD,
            allowed_hours: HoursWindow::business_hours(),
            scan_window_secs: DEFAULT_SCAN_WINDOW_SECS,
            cooldown_enabled: false,
        }
    }
}

impl MonitorConfig {
    /// Set the failed-login threshold.
    pub fn with_failed_login_threshold(mut self, threshold: u64) -> Self {
        self.failed_login_threshold = threshold;
        self
    }

    /// Set the off-hours threshold.
    pub fn with_off_hours_threshold(mut self, threshold: u64) -> Self {
        self.off_hours_threshold = threshold;
        self
    }

    /// Set the grade-change threshold.
    pub fn with_grade_change_threshold(mut self, threshold: u64) -> Self {
        self.grade_change_threshold = threshold;
        self
    }

    /// Set the sensitive-read threshold.
    pub fn with_sensitive_read_threshold(mut self, threshold: u64) -> Self {
        self.sensitive_read_threshold = threshold;
        self
    }

    /// Set the allowed-hours window.
    pub fn with_allowed_hours(mut self, window: HoursWindow) -> Self {
        self.allowed_hours = window;
        self
    }

    /// Set the scan window.
    pub fn with_scan_window(mut self, window: Duration) -> Self {
        self.scan_window_secs = window.as_secs();
        self
    }

    /// Enable alert cool-down deduplication.
    pub fn with_cooldown(mut self, enabled: bool) -> Self {
        self.cooldown_enabled = enabled;
        self
    }

    /// The scan window as a duration.
    pub fn scan_window(&self) -> Duration {
        Duration::from_secs(self.scan_window_secs)
    }
}
