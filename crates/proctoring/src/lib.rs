//! Exam Proctoring Signal Extraction
//!
//! Per-frame behavioral signals from a webcam raster:
//! - Face presence and count (skin-tone ratio)
//! - Head pose (edge brightness)
//! - Phones and study aids (external object detector)
//!
//! `ProctorModule::analyze` fuses the three into one `Detection` per tick.

pub mod analysis;
pub mod config;
pub mod detector;

pub use analysis::{Detection, HeadPose};
pub use config::ProctorConfig;
pub use detector::{FaceCounter, ObjectFindings, ObjectScreen, PoseEstimator};

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use camera_capture::VideoFrame;
use inference_engine::{InferenceError, ObjectDetector};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Signal extraction error types
#[derive(Error, Debug)]
pub enum ProctorError {
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Object detector failed: {0}")]
    Detector(#[from] InferenceError),

    #[error("Object detector task crashed: {0}")]
    DetectorCrashed(String),

    #[error("Object detector still busy with an earlier frame")]
    DetectorBusy,
}

/// Monotonic millisecond clock anchored to wall time at creation
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    origin: Instant,
    origin_epoch_ms: u64,
}

impl SessionClock {
    pub fn new() -> Self {
        let origin_epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            origin: Instant::now(),
            origin_epoch_ms,
        }
    }

    /// Milliseconds; never decreases
    pub fn now_ms(&self) -> u64 {
        self.origin_epoch_ms + self.origin.elapsed().as_millis() as u64
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Signal extraction module; one per session
pub struct ProctorModule {
    face_counter: FaceCounter,
    pose_estimator: PoseEstimator,
    object_screen: ObjectScreen,
    clock: SessionClock,
    tick_index: u64,
}

impl ProctorModule {
    /// Create a module; `detector` is `None` when the model failed to load
    pub fn new(config: ProctorConfig, detector: Option<Arc<dyn ObjectDetector>>) -> Self {
        Self {
            face_counter: FaceCounter::new(&config),
            pose_estimator: PoseEstimator::new(&config),
            object_screen: ObjectScreen::new(&config, detector),
            clock: SessionClock::new(),
            tick_index: 0,
        }
    }

    /// Whether phone/object signals can fire
    pub fn objects_enabled(&self) -> bool {
        self.object_screen.is_available()
    }

    /// Number of detections produced so far
    pub fn ticks(&self) -> u64 {
        self.tick_index
    }

    /// Analyze one frame. Never fails: each extractor falls back to a
    /// neutral value on error.
    pub async fn analyze(&mut self, frame: VideoFrame) -> Detection {
        let tick = self.tick_index;
        self.tick_index += 1;

        let frame = Arc::new(frame);
        let (face_count, head_pose) = self.extract_pixels(Arc::clone(&frame), tick).await;

        let objects = self.object_screen.screen(frame).await;

        let detection = Detection::new(
            face_count,
            head_pose,
            objects.phone_detected,
            objects.suspicious_objects,
            self.clock.now_ms(),
        );

        debug!(
            "Tick {}: faces={} yaw={} pitch={} phone={} objects={:?}",
            tick,
            detection.face_count(),
            head_pose.yaw,
            head_pose.pitch,
            detection.phone_detected(),
            detection.suspicious_objects()
        );

        detection
    }

    /// Face count and head pose off the async workers
    async fn extract_pixels(&self, frame: Arc<VideoFrame>, tick: u64) -> (u32, HeadPose) {
        let face_counter = self.face_counter;
        let pose_estimator = self.pose_estimator;
        let level = HeadPose::new(0.0, 0.0, detector::roll_placeholder(tick));

        let extracted = tokio::task::spawn_blocking(move || {
            let face_count = face_counter.count(&frame).unwrap_or_else(|e| {
                warn!("Face count failed, assuming no face: {}", e);
                0
            });
            let head_pose = pose_estimator.estimate(&frame, tick).unwrap_or_else(|e| {
                warn!("Pose estimation failed, assuming level pose: {}", e);
                level
            });
            (face_count, head_pose)
        })
        .await;

        extracted.unwrap_or_else(|e| {
            warn!("Pixel extraction task failed, assuming no face: {}", e);
            (0, level)
        })
    }
}
