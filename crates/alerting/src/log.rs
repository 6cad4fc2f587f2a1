//! Append-only alert log for one session

use serde::Serialize;
use tracing::{info, warn};

use crate::rules::{Alert, Severity};

/// How many alerts the live view shows
pub const RECENT_ALERT_LIMIT: usize = 5;

/// Alert tallies by severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertCounts {
    pub critical: usize,
    pub warning: usize,
    pub total: usize,
}

/// Every alert raised during a session, oldest first
#[derive(Debug, Clone, Default)]
pub struct AlertLog {
    alerts: Vec<Alert>,
    critical: usize,
}

impl AlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append alerts; existing entries are never touched
    pub fn extend(&mut self, alerts: impl IntoIterator<Item = Alert>) {
        for alert in alerts {
            match alert.severity {
                Severity::Critical => {
                    self.critical += 1;
                    warn!("Critical alert [{}]: {}", alert.id, alert.message);
                }
                Severity::Warning => {
                    info!("Warning alert [{}]: {}", alert.id, alert.message);
                }
            }
            metrics::counter!("proctor_alerts_total", "severity" => alert.severity.as_str())
                .increment(1);
            self.alerts.push(alert);
        }
    }

    /// Up to `n` alerts, most recent first
    pub fn recent(&self, n: usize) -> Vec<Alert> {
        self.alerts.iter().rev().take(n).cloned().collect()
    }

    pub fn counts(&self) -> AlertCounts {
        AlertCounts {
            critical: self.critical,
            warning: self.alerts.len() - self.critical,
            total: self.alerts.len(),
        }
    }

    pub fn critical_count(&self) -> usize {
        self.critical
    }

    pub fn warning_count(&self) -> usize {
        self.alerts.len() - self.critical
    }

    /// Whether any critical alert was ever logged
    pub fn has_critical(&self) -> bool {
        self.critical > 0
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{evaluate, RuleConfig};
    use proctoring::{Detection, HeadPose};

    fn alerts_for(faces: u32, yaw: f32, ts: u64) -> Vec<Alert> {
        let d = Detection::new(faces, HeadPose::new(0.0, yaw, 0.0), false, vec![], ts);
        evaluate(&d, &RuleConfig::default())
    }

    #[test]
    fn test_empty_log() {
        let log = AlertLog::new();
        assert!(log.is_empty());
        assert!(!log.has_critical());
        assert_eq!(log.counts(), AlertCounts::default());
        assert!(log.recent(RECENT_ALERT_LIMIT).is_empty());
    }

    #[test]
    fn test_counts_by_severity() {
        let mut log = AlertLog::new();
        log.extend(alerts_for(0, 0.0, 1));
        log.extend(alerts_for(1, 40.0, 2));
        log.extend(alerts_for(1, 40.0, 3));

        let counts = log.counts();
        assert_eq!(counts.critical, 1);
        assert_eq!(counts.warning, 2);
        assert_eq!(counts.total, 3);
        assert!(log.has_critical());
    }

    #[test]
    fn test_warnings_alone_not_critical() {
        let mut log = AlertLog::new();
        log.extend(alerts_for(1, 30.0, 1));
        assert_eq!(log.len(), 1);
        assert!(!log.has_critical());
    }

    #[test]
    fn test_recent_is_newest_first_and_bounded() {
        let mut log = AlertLog::new();
        for ts in 0..8 {
            log.extend(alerts_for(0, 0.0, ts));
        }

        let recent = log.recent(RECENT_ALERT_LIMIT);
        assert_eq!(recent.len(), 5);
        let stamps: Vec<u64> = recent.iter().map(|a| a.timestamp).collect();
        assert_eq!(stamps, vec![7, 6, 5, 4, 3]);

        // Older entries are still retained
        assert_eq!(log.len(), 8);
        assert_eq!(log.iter().next().map(|a| a.timestamp), Some(0));
    }
}
