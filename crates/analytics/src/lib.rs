//! Session Analytics
//!
//! Read-only statistics over the persisted session collection: totals,
//! flagged counts, averages, and a per-session table in insertion order.

use serde::Serialize;
use storage::SessionRecord;
use tracing::debug;

/// One row of the per-session table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRow {
    pub id: String,
    pub student_name: String,
    pub exam_name: String,
    pub duration_secs: u64,
    /// `HH:MM:SS`
    pub duration: String,
    pub alerts: usize,
    pub flagged: bool,
    pub timestamp: String,
}

impl From<&SessionRecord> for SessionRow {
    fn from(record: &SessionRecord) -> Self {
        Self {
            id: record.id.clone(),
            student_name: record.student_name.clone(),
            exam_name: record.exam_name.clone(),
            duration_secs: record.duration,
            duration: format_duration(record.duration),
            alerts: record.suspicious_activities,
            flagged: record.cheating_detected,
            timestamp: record.timestamp.clone(),
        }
    }
}

/// Aggregate view of every stored session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_sessions: usize,
    /// Sessions with at least one critical alert
    pub flagged_sessions: usize,
    pub clean_sessions: usize,
    pub total_alerts: usize,
    /// Alerts per session, one decimal
    pub average_alerts: f64,
    /// Mean duration, rounded to whole seconds
    pub average_duration_secs: u64,
    pub sessions: Vec<SessionRow>,
}

/// Summarize a collection of records. Deterministic; empty input gives zeros.
pub fn summarize(records: &[SessionRecord]) -> AnalyticsSummary {
    if records.is_empty() {
        return AnalyticsSummary::default();
    }

    let n = records.len();
    let flagged = records.iter().filter(|r| r.cheating_detected).count();
    let total_alerts: usize = records.iter().map(|r| r.suspicious_activities).sum();
    let total_duration: u64 = records.iter().map(|r| r.duration).sum();

    // Half-up, integer only
    let average_duration_secs = (2 * total_duration + n as u64) / (2 * n as u64);
    let average_alerts = (total_alerts as f64 / n as f64 * 10.0).round() / 10.0;

    debug!(
        "Summarized {} sessions: {} flagged, {} alerts",
        n, flagged, total_alerts
    );

    AnalyticsSummary {
        total_sessions: n,
        flagged_sessions: flagged,
        clean_sessions: n - flagged,
        total_alerts,
        average_alerts,
        average_duration_secs,
        sessions: records.iter().map(SessionRow::from).collect(),
    }
}

/// Format seconds as zero-padded `HH:MM:SS`; hours grow past two digits
pub fn format_duration(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn record(ms: i64, student: &str, duration: u64, cheating: bool, alerts: usize) -> SessionRecord {
        let at = Utc.timestamp_millis_opt(ms).unwrap();
        SessionRecord::completed(student, "Physics", duration, cheating, alerts, at)
    }

    #[test]
    fn test_empty_collection() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_sessions, 0);
        assert_eq!(summary.average_alerts, 0.0);
        assert_eq!(summary.average_duration_secs, 0);
        assert!(summary.sessions.is_empty());
    }

    #[test]
    fn test_totals_and_averages() {
        let records = vec![
            record(3, "Cy", 120, true, 5),
            record(1, "Ada", 61, false, 0),
            record(2, "Bo", 60, false, 2),
        ];
        let summary = summarize(&records);

        assert_eq!(summary.total_sessions, 3);
        assert_eq!(summary.flagged_sessions, 1);
        assert_eq!(summary.clean_sessions, 2);
        assert_eq!(summary.total_alerts, 7);
        assert_eq!(summary.average_alerts, 2.3);
        // 241 / 3 = 80.33
        assert_eq!(summary.average_duration_secs, 80);
    }

    #[test]
    fn test_average_duration_rounds_half_up() {
        let records = vec![record(1, "A", 1, false, 0), record(2, "B", 2, false, 0)];
        assert_eq!(summarize(&records).average_duration_secs, 2);
    }

    #[test]
    fn test_rows_keep_insertion_order() {
        let records = vec![
            record(30, "Cy", 3700, true, 1),
            record(10, "Ada", 5, false, 0),
        ];
        let summary = summarize(&records);
        let names: Vec<_> = summary.sessions.iter().map(|r| r.student_name.as_str()).collect();
        assert_eq!(names, vec!["Cy", "Ada"]);
        assert_eq!(summary.sessions[0].duration, "01:01:40");
        assert!(summary.sessions[0].flagged);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "00:00:00");
        assert_eq!(format_duration(59), "00:00:59");
        assert_eq!(format_duration(120), "00:02:00");
        assert_eq!(format_duration(86_399), "23:59:59");
        assert_eq!(format_duration(360_000), "100:00:00");
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(summarize(&[record(1, "Ada", 10, true, 1)])).unwrap();
        assert_eq!(json["totalSessions"], 1);
        assert_eq!(json["flaggedSessions"], 1);
        assert_eq!(json["sessions"][0]["studentName"], "Ada");
    }

    proptest! {
        #[test]
        fn prop_flagged_plus_clean_is_total(flags in proptest::collection::vec(any::<bool>(), 0..50)) {
            let records: Vec<_> = flags
                .iter()
                .enumerate()
                .map(|(i, &f)| record(i as i64, "S", 10, f, usize::from(f)))
                .collect();
            let summary = summarize(&records);
            prop_assert_eq!(summary.flagged_sessions + summary.clean_sessions, summary.total_sessions);
            prop_assert_eq!(summary.sessions.len(), records.len());
        }
    }
}
