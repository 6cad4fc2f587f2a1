//! Per-tick detection snapshot

use serde::{Deserialize, Serialize};

/// Head pose (Euler angles)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadPose {
    /// Up-down tilt in degrees, from top/bottom brightness
    pub pitch: f32,
    /// Left-right rotation in degrees, from left/right brightness
    pub yaw: f32,
    /// Placeholder oscillation driven by the tick counter, not by the image.
    /// No alert rule reads it.
    pub roll: f32,
}

impl HeadPose {
    pub fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }
}

/// Everything the extractors saw in one tick
///
/// Immutable once built. `face_detected` and `multiple_faces` are derived
/// from `face_count`, so `multiple_faces` always implies `face_detected`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    face_count: u32,
    face_detected: bool,
    multiple_faces: bool,
    head_pose: HeadPose,
    phone_detected: bool,
    suspicious_objects: Vec<String>,
    timestamp: u64,
}

impl Detection {
    /// Build a detection; duplicate object labels are dropped, first one wins
    pub fn new(
        face_count: u32,
        head_pose: HeadPose,
        phone_detected: bool,
        suspicious_objects: Vec<String>,
        timestamp: u64,
    ) -> Self {
        let mut objects: Vec<String> = Vec::with_capacity(suspicious_objects.len());
        for label in suspicious_objects {
            if !objects.contains(&label) {
                objects.push(label);
            }
        }

        Self {
            face_count,
            face_detected: face_count > 0,
            multiple_faces: face_count > 1,
            head_pose,
            phone_detected,
            suspicious_objects: objects,
            timestamp,
        }
    }

    pub fn face_count(&self) -> u32 {
        self.face_count
    }

    pub fn face_detected(&self) -> bool {
        self.face_detected
    }

    pub fn multiple_faces(&self) -> bool {
        self.multiple_faces
    }

    pub fn head_pose(&self) -> HeadPose {
        self.head_pose
    }

    pub fn phone_detected(&self) -> bool {
        self.phone_detected
    }

    pub fn suspicious_objects(&self) -> &[String] {
        &self.suspicious_objects
    }

    /// Monotonic milliseconds
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}
