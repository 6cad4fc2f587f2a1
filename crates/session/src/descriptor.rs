//! Session start inputs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Raw start-form input, as submitted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub student_name: String,
    pub exam_name: String,
    /// Advisory only; the recorded duration is always measured time
    #[serde(default)]
    pub duration_minutes_hint: Option<u32>,
}

impl SessionRequest {
    pub fn new(student_name: impl Into<String>, exam_name: impl Into<String>) -> Self {
        Self {
            student_name: student_name.into(),
            exam_name: exam_name.into(),
            duration_minutes_hint: None,
        }
    }

    pub fn with_duration_hint(mut self, minutes: u32) -> Self {
        self.duration_minutes_hint = Some(minutes);
        self
    }
}

/// Validated, immutable description of who is taking which exam
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescriptor {
    student_name: String,
    exam_name: String,
    start_time: DateTime<Utc>,
    duration_hint_minutes: Option<u32>,
}

impl SessionDescriptor {
    /// Validate a start request. Names are trimmed and must not be empty.
    pub fn from_request(request: SessionRequest) -> Result<Self, SessionError> {
        let student_name = request.student_name.trim();
        let exam_name = request.exam_name.trim();

        if student_name.is_empty() {
            return Err(SessionError::Validation("student name is required".into()));
        }
        if exam_name.is_empty() {
            return Err(SessionError::Validation("exam name is required".into()));
        }

        Ok(Self {
            student_name: student_name.to_string(),
            exam_name: exam_name.to_string(),
            start_time: Utc::now(),
            duration_hint_minutes: request.duration_minutes_hint.filter(|m| *m > 0),
        })
    }

    pub fn student_name(&self) -> &str {
        &self.student_name
    }

    pub fn exam_name(&self) -> &str {
        &self.exam_name
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn duration_hint_minutes(&self) -> Option<u32> {
        self.duration_hint_minutes
    }
}
