//! Extractor configuration

use serde::{Deserialize, Serialize};

/// Signal extractor configuration
///
/// The skin-ratio and brightness thresholds are fixed constants in
/// `detector`; only the object-screening knobs are tunable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProctorConfig {
    /// Time the object detector gets per tick before its signal counts as absent (ms)
    pub detector_budget_ms: u64,

    /// Minimum score for a book/notebook/laptop label to count as suspicious
    pub object_confidence: f32,

    /// Run the object detector at all
    pub enable_objects: bool,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            detector_budget_ms: 100,
            object_confidence: 0.5,
            enable_objects: true,
        }
    }
}

impl ProctorConfig {
    /// Face and pose heuristics only
    pub fn heuristics_only() -> Self {
        Self {
            enable_objects: false,
            ..Default::default()
        }
    }
}
