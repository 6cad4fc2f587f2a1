//! Object Detection Inference
//!
//! Defines the detector capability the proctoring pipeline depends on and
//! ships two implementations:
//! - `OnnxObjectDetector`: COCO SSD model on tract-onnx
//! - `ScriptedDetector`: canned responses for tests and demos

mod detector;
mod onnx;

pub use detector::{
    normalize_detections, DetectedObject, ObjectDetector, ScriptedDetector,
    DETECTION_CONTRACT_VERSION,
};
pub use onnx::{coco_label, OnnxDetectorConfig, OnnxObjectDetector};

use thiserror::Error;

/// Errors during inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model load failed: {0}")]
    ModelLoad(String),
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Inference timeout after {0}ms")]
    Timeout(u64),
}
