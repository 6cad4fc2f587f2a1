//! Session Record

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one completed exam session
///
/// Created once, when the session ends. Field names serialize in camelCase
/// so the stored collection keeps the dashboard's record shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// `session-<completion epoch ms>`
    pub id: String,
    pub student_name: String,
    pub exam_name: String,
    /// Seconds elapsed, as counted by the session ticker
    pub duration: u64,
    /// True iff any critical alert was raised
    pub cheating_detected: bool,
    /// Total alerts raised over the whole session
    pub suspicious_activities: usize,
    /// Completion time, RFC 3339 with millisecond precision
    pub timestamp: String,
}

impl SessionRecord {
    /// Build the record for a session completed at `completed_at`
    pub fn completed(
        student_name: impl Into<String>,
        exam_name: impl Into<String>,
        duration: u64,
        cheating_detected: bool,
        suspicious_activities: usize,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("session-{}", completed_at.timestamp_millis()),
            student_name: student_name.into(),
            exam_name: exam_name.into(),
            duration,
            cheating_detected,
            suspicious_activities,
            timestamp: completed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_id_and_timestamp_from_completion_time() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let record = SessionRecord::completed("Ada", "Algebra", 120, true, 5, at);

        assert_eq!(record.id, format!("session-{}", at.timestamp_millis()));
        assert_eq!(record.timestamp, "2024-03-01T09:30:00.000Z");
    }

    #[test]
    fn test_serializes_camel_case() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let record = SessionRecord::completed("Ada", "Algebra", 120, true, 5, at);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["studentName"], "Ada");
        assert_eq!(json["examName"], "Algebra");
        assert_eq!(json["cheatingDetected"], true);
        assert_eq!(json["suspiciousActivities"], 5);
        assert_eq!(json["duration"], 120);
    }
}
