//! Alerting System
//!
//! Turns detections into warning/critical alerts and keeps the session's
//! append-only alert log.

mod log;
mod rules;

pub use log::{AlertCounts, AlertLog, RECENT_ALERT_LIMIT};
pub use rules::{evaluate, Alert, AlertKind, RuleConfig, Severity};
