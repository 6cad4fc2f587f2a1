//! Face count, head pose, and prohibited-object signal extractors

use std::sync::Arc;
use std::time::Duration;

use camera_capture::VideoFrame;
use inference_engine::{normalize_detections, DetectedObject, InferenceError, ObjectDetector};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::analysis::HeadPose;
use crate::{ProctorConfig, ProctorError};

/// Minimum red lead over green and blue for a skin pixel
pub const SKIN_CHANNEL_MARGIN: i32 = 30;
/// Red lead must stay below this
pub const SKIN_CHANNEL_CEILING: i32 = 150;
/// Skin density above which one face is assumed
pub const SINGLE_FACE_DENSITY: f64 = 0.08;
/// Skin density above which the count scales with density
pub const MULTI_FACE_DENSITY: f64 = 0.15;
/// Upper bound on the reported face count
pub const MAX_FACES: u32 = 3;
/// Angle produced by a full-scale (0 vs 255) brightness difference
pub const POSE_FULL_SCALE_DEGREES: f64 = 45.0;
/// Mean assumed for an empty brightness band
const EMPTY_BAND_MEAN: f64 = 128.0;
/// Amplitude of the roll placeholder
const ROLL_AMPLITUDE: f64 = 20.0;

/// Skin classification on one RGB triple
pub fn is_skin([r, g, b]: [u8; 3]) -> bool {
    let rg = r as i32 - g as i32;
    let rb = r as i32 - b as i32;
    rg > SKIN_CHANNEL_MARGIN
        && rb > SKIN_CHANNEL_MARGIN
        && rg.abs() < SKIN_CHANNEL_CEILING
        && rb.abs() < SKIN_CHANNEL_CEILING
}

/// Map a skin-pixel density to a face count
pub fn face_count_for_density(density: f64) -> u32 {
    if density > MULTI_FACE_DENSITY {
        ((density * 3.0).floor() as u32 + 1).min(MAX_FACES)
    } else if density > SINGLE_FACE_DENSITY {
        1
    } else {
        0
    }
}

/// Round to one decimal place, halves upward
pub fn round_tenth(value: f64) -> f32 {
    ((value * 10.0 + 0.5).floor() / 10.0) as f32
}

/// Roll placeholder for a given tick
pub fn roll_placeholder(tick_index: u64) -> f32 {
    round_tenth((tick_index as f64 / 10.0).sin() * ROLL_AMPLITUDE)
}

/// Skin-ratio face counter
///
/// A coarse "face-colored region fills the frame" proxy, not face geometry.
#[derive(Debug, Default, Clone, Copy)]
pub struct FaceCounter;

impl FaceCounter {
    pub fn new(_config: &ProctorConfig) -> Self {
        Self
    }

    /// Fraction of pixels classified as skin
    pub fn skin_density(&self, frame: &VideoFrame) -> Result<f64, ProctorError> {
        validate(frame)?;
        let total = frame.pixel_count();
        if total == 0 {
            return Ok(0.0);
        }
        let skin = frame.pixels().filter(|&p| is_skin(p)).count();
        Ok(skin as f64 / total as f64)
    }

    /// Estimated number of faces in frame
    pub fn count(&self, frame: &VideoFrame) -> Result<u32, ProctorError> {
        let density = self.skin_density(frame)?;
        let faces = face_count_for_density(density);
        debug!("Skin density {:.3} -> {} face(s)", density, faces);
        Ok(faces)
    }
}

#[derive(Default)]
struct Band {
    sum: f64,
    count: u64,
}

impl Band {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        if self.count > 0 {
            self.sum / self.count as f64
        } else {
            EMPTY_BAND_MEAN
        }
    }
}

/// Edge-band brightness head pose estimator
#[derive(Debug, Default, Clone, Copy)]
pub struct PoseEstimator;

impl PoseEstimator {
    pub fn new(_config: &ProctorConfig) -> Self {
        Self
    }

    /// Estimate pitch and yaw from edge brightness; roll from the tick counter
    pub fn estimate(&self, frame: &VideoFrame, tick_index: u64) -> Result<HeadPose, ProctorError> {
        validate(frame)?;

        let width = frame.width as f64;
        let height = frame.height as f64;
        let quarter_w = width / 4.0;
        let quarter_h = height / 4.0;

        let (mut left, mut right, mut top, mut bottom) =
            (Band::default(), Band::default(), Band::default(), Band::default());

        for (i, [r, g, b]) in frame.pixels().enumerate() {
            let x = (i % frame.width as usize) as f64;
            let y = (i / frame.width as usize) as f64;
            let brightness = (r as f64 + g as f64 + b as f64) / 3.0;

            let mid_row = y > quarter_h && y < height - quarter_h;
            let mid_col = x > quarter_w && x < width - quarter_w;

            if x < quarter_w && mid_row {
                left.add(brightness);
            } else if x > width - quarter_w && mid_row {
                right.add(brightness);
            }

            if y < quarter_h && mid_col {
                top.add(brightness);
            } else if y > height - quarter_h && mid_col {
                bottom.add(brightness);
            }
        }

        let yaw = (right.mean() - left.mean()) / 255.0 * POSE_FULL_SCALE_DEGREES;
        let pitch = (bottom.mean() - top.mean()) / 255.0 * POSE_FULL_SCALE_DEGREES;

        Ok(HeadPose {
            pitch: round_tenth(pitch),
            yaw: round_tenth(yaw),
            roll: roll_placeholder(tick_index),
        })
    }
}

/// Object signals for one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectFindings {
    pub phone_detected: bool,
    pub suspicious_objects: Vec<String>,
}

/// Map detector labels to phone / suspicious-object signals
pub fn classify_objects(objects: &[DetectedObject], min_score: f32) -> ObjectFindings {
    let mut findings = ObjectFindings::default();

    for obj in objects {
        let label = obj.label.to_lowercase();

        if label.contains("cell phone") || label.contains("phone") || label.contains("mobile") {
            findings.phone_detected = true;
        }

        let study_aid = label.contains("book") || label.contains("notebook") || label.contains("laptop");
        if study_aid && obj.score > min_score && !findings.suspicious_objects.contains(&obj.label) {
            findings.suspicious_objects.push(obj.label.clone());
        }
    }

    findings
}

type DetectCall = JoinHandle<Result<Vec<DetectedObject>, InferenceError>>;

/// Runs the external detector under a per-tick budget
///
/// At most one detector call is alive at a time. A call that overruns its
/// budget is left to finish in the background and its result discarded;
/// until it does, later ticks skip the detector.
pub struct ObjectScreen {
    detector: Option<Arc<dyn ObjectDetector>>,
    budget: Duration,
    min_score: f32,
    overrun: Option<DetectCall>,
}

impl ObjectScreen {
    pub fn new(config: &ProctorConfig, detector: Option<Arc<dyn ObjectDetector>>) -> Self {
        if detector.is_none() && config.enable_objects {
            warn!("No object detector available; phone and object signals disabled");
        }

        Self {
            detector: if config.enable_objects { detector } else { None },
            budget: Duration::from_millis(config.detector_budget_ms),
            min_score: config.object_confidence,
            overrun: None,
        }
    }

    /// Whether a detector is wired in
    pub fn is_available(&self) -> bool {
        self.detector.is_some()
    }

    /// Whether an overrun call from an earlier tick is still running
    pub fn is_busy(&self) -> bool {
        self.overrun.as_ref().is_some_and(|call| !call.is_finished())
    }

    /// Run the detector; errors, panics, budget overruns, and a still-running
    /// earlier call are returned
    pub async fn try_screen(&mut self, frame: Arc<VideoFrame>) -> Result<ObjectFindings, ProctorError> {
        let Some(detector) = &self.detector else {
            return Ok(ObjectFindings::default());
        };

        if self.is_busy() {
            return Err(ProctorError::DetectorBusy);
        }
        self.overrun = None;

        let detector = Arc::clone(detector);
        let mut call: DetectCall = tokio::spawn(async move { detector.detect(&frame).await });

        let raw = match tokio::time::timeout(self.budget, &mut call).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_error)) => return Err(ProctorError::DetectorCrashed(join_error.to_string())),
            Err(_) => {
                self.overrun = Some(call);
                return Err(InferenceError::Timeout(self.budget.as_millis() as u64).into());
            }
        };

        Ok(classify_objects(&normalize_detections(raw), self.min_score))
    }

    /// Fail-soft wrapper: any failure yields no object signals
    pub async fn screen(&mut self, frame: Arc<VideoFrame>) -> ObjectFindings {
        match self.try_screen(frame).await {
            Ok(findings) => findings,
            Err(ProctorError::DetectorBusy) => {
                debug!("Previous detector call still running, objects absent this tick");
                metrics::counter!("proctor_detector_busy_total").increment(1);
                ObjectFindings::default()
            }
            Err(e) => {
                warn!("Object screening failed, treating objects as absent: {}", e);
                metrics::counter!("proctor_detector_failures_total").increment(1);
                ObjectFindings::default()
            }
        }
    }
}

impl Drop for ObjectScreen {
    fn drop(&mut self) {
        if let Some(call) = self.overrun.take() {
            call.abort();
        }
    }
}

fn validate(frame: &VideoFrame) -> Result<(), ProctorError> {
    frame
        .validate()
        .map_err(|e| ProctorError::InvalidFrame(e.to_string()))
}
