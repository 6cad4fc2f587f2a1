//! Camera Capture Library for Exam Proctoring
//!
//! Provides the raster buffer every detector reads and the capture sources
//! that feed it:
//! - Still-image directory replay (stands in for a webcam)
//! - In-memory frame replay for tests and demos

pub mod frame;
pub mod source;

pub use frame::VideoFrame;
pub use source::{open_source, FrameSource, ImageDirSource, ReplaySource};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Camera not initialized")]
    NotInitialized,
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device path (a directory of frames for `ImageDirSource`)
    pub device: String,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Target FPS
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "./frames".to_string(),
            width: 640,
            height: 480,
            fps: 10,
        }
    }
}
