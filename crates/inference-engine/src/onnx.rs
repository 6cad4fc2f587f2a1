//! SSD-style COCO object detector running on tract-onnx
//!
//! Expects the TensorFlow object-detection export layout: a `uint8`
//! `[1, H, W, 3]` image input and four outputs (num_detections, boxes,
//! scores, classes). Boxes are `[ymin, xmin, ymax, xmax]`, normalised to the
//! input size; classes are 1-based COCO ids.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use camera_capture::VideoFrame;
use serde::{Deserialize, Serialize};
use tract_onnx::prelude::*;
use tracing::{debug, info};

use crate::detector::{DetectedObject, ObjectDetector};
use crate::InferenceError;

/// COCO label map as used by the TF detection zoo (index = class id)
const COCO_LABELS: [&str; 91] = [
    "", "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "", "stop sign", "parking meter", "bench", "bird", "cat",
    "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "", "backpack",
    "umbrella", "", "", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard",
    "sports ball", "kite", "baseball bat", "baseball glove", "skateboard", "surfboard",
    "tennis racket", "bottle", "", "wine glass", "cup", "fork", "knife", "spoon", "bowl",
    "banana", "apple", "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut",
    "cake", "chair", "couch", "potted plant", "bed", "", "dining table", "", "", "toilet", "",
    "tv", "laptop", "mouse", "remote", "keyboard", "cell phone", "microwave", "oven", "toaster",
    "sink", "refrigerator", "", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
    "toothbrush",
];

/// Look up a COCO class id
pub fn coco_label(class_id: usize) -> Option<&'static str> {
    COCO_LABELS.get(class_id).copied().filter(|l| !l.is_empty())
}

/// ONNX detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnnxDetectorConfig {
    /// Square model input size in pixels
    pub input_size: u32,
    /// Minimum score for a detection to be reported
    pub min_score: f32,
    /// Maximum detections per frame
    pub max_detections: usize,
    /// Output indices: num_detections, boxes, scores, classes
    pub output_order: [usize; 4],
}

impl Default for OnnxDetectorConfig {
    fn default() -> Self {
        Self {
            input_size: 300,
            min_score: 0.5,
            max_detections: 20,
            output_order: [0, 1, 2, 3],
        }
    }
}

type Plan = TypedRunnableModel<TypedModel>;

/// COCO object detector backed by an ONNX model
pub struct OnnxObjectDetector {
    plan: Arc<Plan>,
    config: OnnxDetectorConfig,
}

impl OnnxObjectDetector {
    /// Load and optimise a model
    pub fn load(path: &Path, config: OnnxDetectorConfig) -> Result<Self, InferenceError> {
        info!("Loading object detection model from {}", path.display());
        let size = config.input_size as usize;

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|m| m.with_input_fact(0, u8::fact([1, size, size, 3]).into()))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| InferenceError::ModelLoad(e.to_string()))?;

        Ok(Self {
            plan: Arc::new(plan),
            config,
        })
    }

    fn run(plan: &Plan, config: &OnnxDetectorConfig, frame: &VideoFrame) -> Result<Vec<DetectedObject>, InferenceError> {
        let start = Instant::now();
        let size = config.input_size;

        let img = frame
            .as_rgb_image()
            .ok_or_else(|| InferenceError::InvalidInput("frame buffer does not match dimensions".into()))?;
        let resized = image::imageops::resize(&img, size, size, image::imageops::FilterType::Triangle);

        let input = Tensor::from_shape::<u8>(&[1, size as usize, size as usize, 3], resized.as_raw())
            .map_err(|e| InferenceError::InvalidInput(e.to_string()))?;

        let outputs = plan
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        let [count_idx, boxes_idx, scores_idx, classes_idx] = config.output_order;
        let view = |idx: usize| {
            outputs
                .get(idx)
                .ok_or_else(|| InferenceError::InferenceFailed(format!("missing output {}", idx)))
                .and_then(|t| {
                    t.as_slice::<f32>()
                        .map_err(|e| InferenceError::InferenceFailed(e.to_string()))
                })
        };

        let count = view(count_idx)?.first().copied().unwrap_or(0.0).max(0.0) as usize;
        let boxes = view(boxes_idx)?;
        let scores = view(scores_idx)?;
        let classes = view(classes_idx)?;

        let n = count.min(scores.len()).min(classes.len()).min(boxes.len() / 4);
        let (fw, fh) = (frame.width as f32, frame.height as f32);

        let mut objects = Vec::new();
        for i in 0..n {
            if scores[i] < config.min_score {
                continue;
            }
            let Some(label) = coco_label(classes[i].round().max(0.0) as usize) else {
                continue;
            };
            let (ymin, xmin, ymax, xmax) = (boxes[i * 4], boxes[i * 4 + 1], boxes[i * 4 + 2], boxes[i * 4 + 3]);
            objects.push(DetectedObject::new(
                label,
                scores[i],
                [xmin * fw, ymin * fh, (xmax - xmin) * fw, (ymax - ymin) * fh],
            ));
            if objects.len() >= config.max_detections {
                break;
            }
        }

        debug!("ONNX detection: {} objects in {}ms", objects.len(), start.elapsed().as_millis());
        Ok(objects)
    }
}

#[async_trait]
impl ObjectDetector for OnnxObjectDetector {
    fn name(&self) -> &'static str {
        "onnx-ssd"
    }

    async fn detect(&self, frame: &VideoFrame) -> Result<Vec<DetectedObject>, InferenceError> {
        let plan = Arc::clone(&self.plan);
        let config = self.config.clone();
        let frame = frame.clone();

        tokio::task::spawn_blocking(move || Self::run(&plan, &config, &frame))
            .await
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coco_labels_for_prohibited_items() {
        assert_eq!(coco_label(77), Some("cell phone"));
        assert_eq!(coco_label(84), Some("book"));
        assert_eq!(coco_label(73), Some("laptop"));
        assert_eq!(coco_label(1), Some("person"));
    }

    #[test]
    fn test_coco_label_gaps_and_range() {
        assert_eq!(coco_label(0), None);
        assert_eq!(coco_label(12), None);
        assert_eq!(coco_label(91), None);
    }

    #[test]
    fn test_missing_model_is_load_error() {
        let result = OnnxObjectDetector::load(Path::new("/no/such/model.onnx"), OnnxDetectorConfig::default());
        assert!(matches!(result, Err(InferenceError::ModelLoad(_))));
    }
}
