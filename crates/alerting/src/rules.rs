//! Alert rules

use proctoring::Detection;
use serde::{Deserialize, Serialize};

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

/// Which rule produced an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    /// No face in frame
    #[serde(rename = "face")]
    NoFace,
    /// More than one face
    #[serde(rename = "multi-face")]
    MultipleFaces,
    /// Phone or similar device
    #[serde(rename = "phone")]
    Phone,
    /// Head turned sideways
    #[serde(rename = "head-yaw")]
    HeadYaw,
    /// Head tilted up or down
    #[serde(rename = "head-pitch")]
    HeadPitch,
    /// Book, notebook, or laptop
    #[serde(rename = "objects")]
    SuspiciousObject,
}

impl AlertKind {
    /// Stable tag used as the alert id prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::NoFace => "face",
            AlertKind::MultipleFaces => "multi-face",
            AlertKind::Phone => "phone",
            AlertKind::HeadYaw => "head-yaw",
            AlertKind::HeadPitch => "head-pitch",
            AlertKind::SuspiciousObject => "objects",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            AlertKind::NoFace | AlertKind::MultipleFaces | AlertKind::Phone => Severity::Critical,
            AlertKind::HeadYaw | AlertKind::HeadPitch | AlertKind::SuspiciousObject => Severity::Warning,
        }
    }
}

/// A rule finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// `<kind>-<detection timestamp>`; unique within a tick
    pub id: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    /// Timestamp of the detection that fired it
    pub timestamp: u64,
}

impl Alert {
    fn fire(kind: AlertKind, message: String, timestamp: u64) -> Self {
        Self {
            id: format!("{}-{}", kind.as_str(), timestamp),
            kind,
            severity: kind.severity(),
            message,
            timestamp,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// Rule thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// |yaw| above this raises a warning (degrees)
    pub yaw_limit_degrees: f32,
    /// |pitch| above this raises a warning (degrees)
    pub pitch_limit_degrees: f32,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            yaw_limit_degrees: 25.0,
            pitch_limit_degrees: 25.0,
        }
    }
}

/// Evaluate every rule against one detection.
///
/// Pure: the same detection always yields the same alerts, in rule order.
/// Roll is never consulted.
pub fn evaluate(detection: &Detection, config: &RuleConfig) -> Vec<Alert> {
    let ts = detection.timestamp();
    let pose = detection.head_pose();
    let mut alerts = Vec::new();

    if !detection.face_detected() {
        alerts.push(Alert::fire(
            AlertKind::NoFace,
            "No face detected - Look at the camera!".to_string(),
            ts,
        ));
    }

    if detection.multiple_faces() {
        alerts.push(Alert::fire(
            AlertKind::MultipleFaces,
            "Multiple faces detected!".to_string(),
            ts,
        ));
    }

    if detection.phone_detected() {
        alerts.push(Alert::fire(
            AlertKind::Phone,
            "Phone or device detected!".to_string(),
            ts,
        ));
    }

    if pose.yaw.abs() > config.yaw_limit_degrees {
        alerts.push(Alert::fire(
            AlertKind::HeadYaw,
            "Head turned too much - Look forward!".to_string(),
            ts,
        ));
    }

    if pose.pitch.abs() > config.pitch_limit_degrees {
        alerts.push(Alert::fire(
            AlertKind::HeadPitch,
            "Excessive head movement detected".to_string(),
            ts,
        ));
    }

    if !detection.suspicious_objects().is_empty() {
        alerts.push(Alert::fire(
            AlertKind::SuspiciousObject,
            format!(
                "Suspicious object detected: {}",
                detection.suspicious_objects().join(", ")
            ),
            ts,
        ));
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctoring::HeadPose;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn detection(faces: u32, yaw: f32, pitch: f32) -> Detection {
        Detection::new(faces, HeadPose::new(pitch, yaw, 0.0), false, vec![], 1_000)
    }

    #[test]
    fn test_no_face_is_single_critical() {
        let alerts = evaluate(&detection(0, 0.0, 0.0), &RuleConfig::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(alerts[0].message, "No face detected - Look at the camera!");
        assert_eq!(alerts[0].id, "face-1000");
    }

    #[test]
    fn test_multiple_faces_without_no_face_alert() {
        let alerts = evaluate(&detection(2, 0.0, 0.0), &RuleConfig::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::MultipleFaces);
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(alerts[0].message, "Multiple faces detected!");
    }

    #[test]
    fn test_yaw_threshold() {
        let alerts = evaluate(&detection(1, 30.0, 0.0), &RuleConfig::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Warning);
        assert_eq!(alerts[0].message, "Head turned too much - Look forward!");

        assert!(evaluate(&detection(1, 20.0, 0.0), &RuleConfig::default()).is_empty());
        assert!(evaluate(&detection(1, -25.0, 0.0), &RuleConfig::default()).is_empty());
        assert_eq!(evaluate(&detection(1, -25.1, 0.0), &RuleConfig::default()).len(), 1);
    }

    #[test]
    fn test_pitch_threshold() {
        let alerts = evaluate(&detection(1, 0.0, -40.0), &RuleConfig::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::HeadPitch);
        assert_eq!(alerts[0].message, "Excessive head movement detected");
    }

    #[test]
    fn test_roll_never_alerts() {
        let d = Detection::new(1, HeadPose::new(0.0, 0.0, 90.0), false, vec![], 5);
        assert!(evaluate(&d, &RuleConfig::default()).is_empty());
    }

    #[test]
    fn test_objects_message_joins_labels() {
        let d = Detection::new(
            1,
            HeadPose::default(),
            false,
            vec!["book".into(), "laptop".into()],
            7,
        );
        let alerts = evaluate(&d, &RuleConfig::default());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, "Suspicious object detected: book, laptop");
        assert_eq!(alerts[0].id, "objects-7");
    }

    #[test]
    fn test_all_rules_fire_with_unique_ids() {
        let d = Detection::new(
            3,
            HeadPose::new(-30.0, 30.0, 0.0),
            true,
            vec!["notebook".into()],
            99,
        );
        let alerts = evaluate(&d, &RuleConfig::default());
        let kinds: Vec<_> = alerts.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                AlertKind::MultipleFaces,
                AlertKind::Phone,
                AlertKind::HeadYaw,
                AlertKind::HeadPitch,
                AlertKind::SuspiciousObject,
            ]
        );
        let ids: HashSet<_> = alerts.iter().map(|a| a.id.clone()).collect();
        assert_eq!(ids.len(), alerts.len());
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"critical\"");
        assert_eq!(serde_json::to_string(&AlertKind::MultipleFaces).unwrap(), "\"multi-face\"");
    }

    #[test]
    fn test_kind_serializes_as_id_tag() {
        let kinds = [
            AlertKind::NoFace,
            AlertKind::MultipleFaces,
            AlertKind::Phone,
            AlertKind::HeadYaw,
            AlertKind::HeadPitch,
            AlertKind::SuspiciousObject,
        ];
        for kind in kinds {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(serde_json::from_str::<AlertKind>(&json).unwrap(), kind);
        }
    }

    proptest! {
        #[test]
        fn prop_evaluate_is_pure(
            faces in 0u32..4,
            yaw in -45.0f32..45.0,
            pitch in -45.0f32..45.0,
            phone in any::<bool>(),
            ts in any::<u64>(),
        ) {
            let d = Detection::new(faces, HeadPose::new(pitch, yaw, 0.0), phone, vec![], ts);
            let first = evaluate(&d, &RuleConfig::default());
            let second = evaluate(&d.clone(), &RuleConfig::default());
            prop_assert_eq!(first, second);
        }
    }
}
