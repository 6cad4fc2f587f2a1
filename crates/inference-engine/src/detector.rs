//! Object detector boundary contract

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use camera_capture::VideoFrame;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::InferenceError;

/// Version of the `DetectedObject` shape produced at this boundary
pub const DETECTION_CONTRACT_VERSION: u32 = 1;

/// One object reported by a detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    /// Class label as reported by the model (e.g. "cell phone")
    pub label: String,
    /// Confidence score (0.0 to 1.0)
    pub score: f32,
    /// Bounding box [x, y, width, height] in frame pixels
    pub bbox: [f32; 4],
}

impl DetectedObject {
    pub fn new(label: impl Into<String>, score: f32, bbox: [f32; 4]) -> Self {
        Self {
            label: label.into(),
            score,
            bbox,
        }
    }

    /// Clean up a raw detector result, or drop it if unusable.
    ///
    /// Labels are trimmed and must be non-empty; scores must be finite and
    /// are clamped to [0, 1]; box extents must be finite and non-negative.
    pub fn normalize(self) -> Option<Self> {
        let label = self.label.trim();
        if label.is_empty() || !self.score.is_finite() {
            return None;
        }
        if self.bbox.iter().any(|v| !v.is_finite()) || self.bbox[2] < 0.0 || self.bbox[3] < 0.0 {
            return None;
        }

        Some(Self {
            label: label.to_string(),
            score: self.score.clamp(0.0, 1.0),
            bbox: self.bbox,
        })
    }
}

/// Normalize a detector response, dropping malformed entries
pub fn normalize_detections(raw: Vec<DetectedObject>) -> Vec<DetectedObject> {
    let before = raw.len();
    let cleaned: Vec<_> = raw.into_iter().filter_map(DetectedObject::normalize).collect();
    if cleaned.len() != before {
        debug!("Dropped {} malformed detections", before - cleaned.len());
    }
    cleaned
}

/// Black-box object detection capability
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    /// Display name for logs
    fn name(&self) -> &'static str;

    /// Detect objects in a frame
    async fn detect(&self, frame: &VideoFrame) -> Result<Vec<DetectedObject>, InferenceError>;
}

/// Detector that replays queued responses, then repeats a fallback
pub struct ScriptedDetector {
    queue: Mutex<VecDeque<Result<Vec<DetectedObject>, String>>>,
    fallback: Result<Vec<DetectedObject>, String>,
    latency: Option<Duration>,
}

impl ScriptedDetector {
    /// Always report the same objects
    pub fn always(objects: Vec<DetectedObject>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Ok(objects),
            latency: None,
        }
    }

    /// Never see anything
    pub fn empty() -> Self {
        Self::always(Vec::new())
    }

    /// Fail every call
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Err(reason.into()),
            latency: None,
        }
    }

    /// Delay every response
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue a one-shot response ahead of the fallback
    pub fn push(&self, response: Result<Vec<DetectedObject>, String>) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(response);
        }
    }
}

#[async_trait]
impl ObjectDetector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn detect(&self, _frame: &VideoFrame) -> Result<Vec<DetectedObject>, InferenceError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let next = self
            .queue
            .lock()
            .map_err(|e| InferenceError::InferenceFailed(format!("Lock error: {}", e)))?
            .pop_front();

        next.unwrap_or_else(|| self.fallback.clone())
            .map_err(InferenceError::InferenceFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_clamps() {
        let obj = DetectedObject::new("  book ", 1.7, [1.0, 2.0, 3.0, 4.0])
            .normalize()
            .unwrap();
        assert_eq!(obj.label, "book");
        assert_eq!(obj.score, 1.0);
    }

    #[test]
    fn test_normalize_drops_malformed() {
        let raw = vec![
            DetectedObject::new("", 0.9, [0.0; 4]),
            DetectedObject::new("laptop", f32::NAN, [0.0; 4]),
            DetectedObject::new("cell phone", 0.8, [0.0, 0.0, -5.0, 2.0]),
            DetectedObject::new("cell phone", 0.8, [0.0, 0.0, 5.0, 2.0]),
        ];
        let cleaned = normalize_detections(raw);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].label, "cell phone");
    }

    #[tokio::test]
    async fn test_scripted_queue_then_fallback() {
        let detector = ScriptedDetector::empty();
        detector.push(Err("warming up".into()));
        detector.push(Ok(vec![DetectedObject::new("book", 0.9, [0.0; 4])]));

        let frame = VideoFrame::solid(2, 2, [0, 0, 0]);
        assert!(detector.detect(&frame).await.is_err());
        assert_eq!(detector.detect(&frame).await.unwrap().len(), 1);
        assert!(detector.detect(&frame).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_detector_always_errors() {
        let detector = ScriptedDetector::failing("model offline");
        let frame = VideoFrame::solid(2, 2, [0, 0, 0]);
        for _ in 0..3 {
            assert!(matches!(
                detector.detect(&frame).await,
                Err(InferenceError::InferenceFailed(_))
            ));
        }
    }
}
