//! Anomaly monitoring over the audit stream.

pub mod alert;
pub mod checks;
pub mod scanner;

pub use alert::{Alert, AlertKind, AlertSink, MemoryAlertSink, Resolution, Severity};
pub use scanner::AnomalyMonitor;
