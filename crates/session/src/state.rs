//! Session state machine
//!
//! Timer-free: the controller drives it with detections and one-second
//! ticks, tests drive it directly.

use std::fmt;

use alerting::{evaluate, Alert, AlertCounts, AlertLog, RuleConfig, RECENT_ALERT_LIMIT};
use analytics::format_duration;
use chrono::{DateTime, Utc};
use proctoring::Detection;
use serde::Serialize;
use storage::SessionRecord;
use tracing::{debug, info};

use crate::{SessionDescriptor, SessionError};

/// Lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Running,
    /// Terminal
    Ended,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Running => "running",
            SessionPhase::Ended => "ended",
        };
        f.write_str(s)
    }
}

/// Snapshot for the live view
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStatus {
    pub phase: SessionPhase,
    pub student_name: Option<String>,
    pub exam_name: Option<String>,
    pub elapsed_secs: u64,
    /// `HH:MM:SS`
    pub elapsed: String,
    pub latest_detection: Option<Detection>,
    /// Most recent first
    pub recent_alerts: Vec<Alert>,
    pub alert_counts: AlertCounts,
}

impl Default for LiveStatus {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            student_name: None,
            exam_name: None,
            elapsed_secs: 0,
            elapsed: format_duration(0),
            latest_detection: None,
            recent_alerts: Vec::new(),
            alert_counts: AlertCounts::default(),
        }
    }
}

/// One exam session
pub struct Session {
    phase: SessionPhase,
    descriptor: Option<SessionDescriptor>,
    rules: RuleConfig,
    alerts: AlertLog,
    latest: Option<Detection>,
    elapsed_secs: u64,
    hint_reported: bool,
}

impl Session {
    pub fn new(rules: RuleConfig) -> Self {
        Self {
            phase: SessionPhase::Idle,
            descriptor: None,
            rules,
            alerts: AlertLog::new(),
            latest: None,
            elapsed_secs: 0,
            hint_reported: false,
        }
    }

    /// `Idle -> Running`
    pub fn start(&mut self, descriptor: SessionDescriptor) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Idle {
            return Err(SessionError::InvalidState {
                action: "start",
                phase: self.phase,
            });
        }

        info!(
            "Session started: {} / {}",
            descriptor.student_name(),
            descriptor.exam_name()
        );
        self.descriptor = Some(descriptor);
        self.phase = SessionPhase::Running;
        Ok(())
    }

    /// Run the rules on a detection and log what fired. Ignored unless running.
    pub fn on_detection(&mut self, detection: Detection) -> usize {
        if self.phase != SessionPhase::Running {
            return 0;
        }

        let fired = evaluate(&detection, &self.rules);
        let count = fired.len();
        if count > 0 {
            debug!("{} alert(s) at {}", count, detection.timestamp());
        }
        self.alerts.extend(fired);
        self.latest = Some(detection);
        count
    }

    /// Count one elapsed second. Ignored unless running.
    pub fn tick_second(&mut self) {
        if self.phase != SessionPhase::Running {
            return;
        }
        self.elapsed_secs += 1;

        if self.hint_reported {
            return;
        }
        let hint = self
            .descriptor
            .as_ref()
            .and_then(SessionDescriptor::duration_hint_minutes);
        if let Some(minutes) = hint {
            if self.elapsed_secs >= u64::from(minutes) * 60 {
                info!(
                    "Session reached its {} minute hint ({})",
                    minutes,
                    format_duration(self.elapsed_secs)
                );
                self.hint_reported = true;
            }
        }
    }

    /// `Running -> Ended`, producing the record. Ending twice yields `None`.
    pub fn end(&mut self, completed_at: DateTime<Utc>) -> Result<Option<SessionRecord>, SessionError> {
        match self.phase {
            SessionPhase::Idle => Err(SessionError::NotStarted),
            SessionPhase::Ended => Ok(None),
            SessionPhase::Running => {
                self.phase = SessionPhase::Ended;
                let Some(descriptor) = self.descriptor.as_ref() else {
                    return Err(SessionError::NotStarted);
                };

                let record = SessionRecord::completed(
                    descriptor.student_name(),
                    descriptor.exam_name(),
                    self.elapsed_secs,
                    self.alerts.has_critical(),
                    self.alerts.len(),
                    completed_at,
                );

                info!(
                    "Session ended: {} after {} with {} alerts (flagged: {})",
                    record.id,
                    format_duration(record.duration),
                    record.suspicious_activities,
                    record.cheating_detected
                );
                Ok(Some(record))
            }
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    pub fn alerts(&self) -> &AlertLog {
        &self.alerts
    }

    pub fn latest_detection(&self) -> Option<&Detection> {
        self.latest.as_ref()
    }

    pub fn live_status(&self) -> LiveStatus {
        LiveStatus {
            phase: self.phase,
            student_name: self.descriptor.as_ref().map(|d| d.student_name().to_string()),
            exam_name: self.descriptor.as_ref().map(|d| d.exam_name().to_string()),
            elapsed_secs: self.elapsed_secs,
            elapsed: format_duration(self.elapsed_secs),
            latest_detection: self.latest.clone(),
            recent_alerts: self.alerts.recent(RECENT_ALERT_LIMIT),
            alert_counts: self.alerts.counts(),
        }
    }
}
