//! Document object detection with YOLOv8-style ONNX models.

use image::{DynamicImage, GenericImageView};
use ndarray::{ArrayD, Axis, Ix2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::OcrError;
use crate::models::config::DetectionConfig;
use invex_inference::{InferenceBackend, InputTensor, OutputTensor};

use super::preprocessing::{ImagePreprocessor, Letterbox};

/// A detected object in original image coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Bounding box (x1, y1, x2, y2).
    pub bbox: [f32; 4],
    /// Model class index.
    pub class_id: usize,
    /// Class confidence score.
    pub score: f32,
}

impl Detection {
    pub fn area(&self) -> f32 {
        (self.bbox[2] - self.bbox[0]).max(0.0) * (self.bbox[3] - self.bbox[1]).max(0.0)
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &Detection) -> f32 {
        let x1 = self.bbox[0].max(other.bbox[0]);
        let y1 = self.bbox[1].max(other.bbox[1]);
        let x2 = self.bbox[2].min(other.bbox[2]);
        let y2 = self.bbox[3].min(other.bbox[3]);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// Object detector for single-output YOLOv8 models.
///
/// The model output is `[1, 4 + classes, anchors]`, each anchor holding a
/// center box followed by one score per class.
pub struct ObjectDetector<B: InferenceBackend> {
    backend: B,
    preprocessor: ImagePreprocessor,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
    max_detections: usize,
}

impl<B: InferenceBackend> ObjectDetector<B> {
    /// Create a new detector with the given backend.
    pub fn new(backend: B) -> Self {
        Self::from_config(backend, &DetectionConfig::default())
    }

    /// Create a detector using thresholds from configuration.
    pub fn from_config(backend: B, config: &DetectionConfig) -> Self {
        Self {
            backend,
            preprocessor: ImagePreprocessor::new(),
            input_size: config.input_size,
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.iou_threshold,
            max_detections: config.max_detections,
        }
    }

    /// Set the square model input size.
    pub fn with_input_size(mut self, size: u32) -> Self {
        self.input_size = size;
        self
    }

    /// Set the minimum class score.
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the NMS IoU threshold.
    pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    /// Set the maximum number of detections kept.
    pub fn with_max_detections(mut self, max: usize) -> Self {
        self.max_detections = max;
        self
    }

    /// Detect objects in an image, best score first.
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, OcrError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(OcrError::InvalidImage(format!("empty image {}x{}", width, height)));
        }

        if self.input_size == 0 {
            return Err(OcrError::Detection("input size must be positive".to_string()));
        }

        let (tensor, letterbox) = self.preprocessor.letterbox(image, self.input_size)?;
        debug!("Detection input shape: {:?}, scale: {}", tensor.shape(), letterbox.scale);

        let input_name = self
            .backend
            .input_names()
            .first()
            .map(String::as_str)
            .unwrap_or("images");
        let input = InputTensor::Float32(tensor.into_dyn());

        let outputs = self
            .backend
            .run(&[(input_name, input)])
            .map_err(|e| OcrError::Detection(e.to_string()))?;

        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| OcrError::Detection("No output from model".to_string()))?
            .1;

        let output_arr = match output {
            OutputTensor::Float32(arr) => arr,
            _ => return Err(OcrError::Detection("Unexpected output type".to_string())),
        };

        debug!("Detection output shape: {:?}", output_arr.shape());

        let candidates = self.decode(&output_arr, &letterbox, (width, height))?;
        let detections = self.non_max_suppression(candidates);

        debug!("Detected {} objects", detections.len());

        Ok(detections)
    }

    /// Turn raw anchors into scored boxes in original image space.
    fn decode(
        &self,
        output: &ArrayD<f32>,
        letterbox: &Letterbox,
        (width, height): (u32, u32),
    ) -> Result<Vec<Detection>, OcrError> {
        let shape = output.shape();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(OcrError::Detection(format!("Invalid output shape: {:?}", shape)));
        }

        let rows = output
            .index_axis(Axis(0), 0)
            .into_dimensionality::<Ix2>()
            .map_err(|e| OcrError::Detection(e.to_string()))?;
        let (channels, anchors) = rows.dim();
        if channels < 5 {
            return Err(OcrError::Detection(format!(
                "Expected at least 5 channels, got {}",
                channels
            )));
        }

        let mut detections = Vec::new();

        for a in 0..anchors {
            let (class_id, score) = (4..channels)
                .map(|c| (c - 4, rows[[c, a]]))
                .fold((0, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 { cur } else { best }
                });

            if score < self.confidence_threshold {
                continue;
            }

            let (cx, cy, w, h) = (rows[[0, a]], rows[[1, a]], rows[[2, a]], rows[[3, a]]);
            let (x1, y1) = letterbox.to_original(cx - w / 2.0, cy - h / 2.0);
            let (x2, y2) = letterbox.to_original(cx + w / 2.0, cy + h / 2.0);

            detections.push(Detection {
                bbox: [
                    x1.clamp(0.0, width as f32),
                    y1.clamp(0.0, height as f32),
                    x2.clamp(0.0, width as f32),
                    y2.clamp(0.0, height as f32),
                ],
                class_id,
                score,
            });
        }

        Ok(detections)
    }

    /// Class-wise NMS, keeping at most `max_detections` boxes.
    fn non_max_suppression(&self, mut candidates: Vec<Detection>) -> Vec<Detection> {
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut keep: Vec<Detection> = Vec::new();
        let mut suppressed = vec![false; candidates.len()];

        for i in 0..candidates.len() {
            if suppressed[i] {
                continue;
            }
            if keep.len() >= self.max_detections {
                break;
            }

            for j in (i + 1)..candidates.len() {
                if !suppressed[j]
                    && candidates[i].class_id == candidates[j].class_id
                    && candidates[i].iou(&candidates[j]) > self.iou_threshold
                {
                    suppressed[j] = true;
                }
            }

            keep.push(candidates[i].clone());
        }

        keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invex_inference::InferenceError;
    use ndarray::IxDyn;
    use pretty_assertions::assert_eq;

    /// Backend returning a fixed output, checking the input shape.
    struct FakeBackend {
        output: ArrayD<f32>,
        input_size: usize,
        names: Vec<String>,
    }

    impl FakeBackend {
        /// `anchors` rows are `[cx, cy, w, h, score per class...]`.
        fn new(input_size: usize, anchors: &[Vec<f32>]) -> Self {
            let channels = anchors[0].len();
            let mut output = ArrayD::zeros(IxDyn(&[1, channels, anchors.len()]));
            for (a, row) in anchors.iter().enumerate() {
                for (c, &v) in row.iter().enumerate() {
                    output[[0, c, a]] = v;
                }
            }
            Self {
                output,
                input_size,
                names: vec!["images".to_string()],
            }
        }
    }

    impl InferenceBackend for FakeBackend {
        fn run(
            &self,
            inputs: &[(&str, InputTensor)],
        ) -> invex_inference::Result<Vec<(String, OutputTensor)>> {
            let (name, tensor) = &inputs[0];
            let expected = [1, 3, self.input_size, self.input_size];
            if *name != "images" || tensor.shape() != expected {
                return Err(InferenceError::InvalidInput(format!(
                    "{} {:?}",
                    name,
                    tensor.shape()
                )));
            }
            Ok(vec![(
                "output0".to_string(),
                OutputTensor::Float32(self.output.clone()),
            )])
        }

        fn input_names(&self) -> &[String] {
            &self.names
        }

        fn output_names(&self) -> &[String] {
            &self.names
        }
    }

    fn blank(width: u32, height: u32) -> DynamicImage {
        DynamicImage::new_rgb8(width, height)
    }

    #[test]
    fn test_iou() {
        let a = Detection {
            bbox: [0.0, 0.0, 10.0, 10.0],
            class_id: 0,
            score: 1.0,
        };
        let b = Detection {
            bbox: [5.0, 0.0, 15.0, 10.0],
            class_id: 0,
            score: 1.0,
        };
        let c = Detection {
            bbox: [20.0, 20.0, 30.0, 30.0],
            class_id: 0,
            score: 1.0,
        };

        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(a.iou(&c), 0.0);
        assert_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_decode_and_suppress_overlaps() {
        let backend = FakeBackend::new(
            64,
            &[
                vec![20.0, 20.0, 10.0, 10.0, 0.9, 0.0],
                vec![21.0, 20.0, 10.0, 10.0, 0.8, 0.0],
                vec![50.0, 50.0, 8.0, 8.0, 0.0, 0.1],
            ],
        );
        let detector = ObjectDetector::new(backend).with_input_size(64);

        let detections = detector.detect(&blank(64, 64)).unwrap();

        assert_eq!(
            detections,
            vec![Detection {
                bbox: [15.0, 15.0, 25.0, 25.0],
                class_id: 0,
                score: 0.9,
            }]
        );
    }

    #[test]
    fn test_overlapping_boxes_of_different_classes_survive() {
        let backend = FakeBackend::new(
            64,
            &[
                vec![20.0, 20.0, 10.0, 10.0, 0.9, 0.0],
                vec![20.0, 20.0, 10.0, 10.0, 0.0, 0.7],
            ],
        );
        let detector = ObjectDetector::new(backend).with_input_size(64);

        let detections = detector.detect(&blank(64, 64)).unwrap();

        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].class_id, 0);
        assert_eq!(detections[1].class_id, 1);
    }

    #[test]
    fn test_boxes_map_back_through_letterbox() {
        // 128x64 image in a 64 input: scale 0.5, 16 px padding top and bottom.
        let backend = FakeBackend::new(64, &[vec![32.0, 32.0, 20.0, 10.0, 0.6]]);
        let detector = ObjectDetector::new(backend).with_input_size(64);

        let detections = detector.detect(&blank(128, 64)).unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].bbox, [44.0, 22.0, 84.0, 42.0]);
    }

    #[test]
    fn test_max_detections() {
        let anchors: Vec<Vec<f32>> = (0..5)
            .map(|i| vec![5.0 + 12.0 * i as f32, 10.0, 8.0, 8.0, 0.5 + 0.1 * i as f32])
            .collect();
        let detector = ObjectDetector::new(FakeBackend::new(64, &anchors))
            .with_input_size(64)
            .with_max_detections(2);

        let detections = detector.detect(&blank(64, 64)).unwrap();

        assert_eq!(detections.len(), 2);
        assert!(detections[0].score > detections[1].score);
        assert!((detections[0].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_zero_input_size_is_an_error() {
        let backend = FakeBackend::new(64, &[vec![20.0, 20.0, 10.0, 10.0, 0.9]]);
        let detector = ObjectDetector::new(backend).with_input_size(0);

        let err = detector.detect(&blank(64, 64)).unwrap_err();
        assert!(matches!(err, OcrError::Detection(_)));
    }

    #[test]
    fn test_rejects_bad_output_shape() {
        let mut backend = FakeBackend::new(64, &[vec![0.0; 5]]);
        backend.output = ArrayD::zeros(IxDyn(&[1, 5]));
        let detector = ObjectDetector::new(backend).with_input_size(64);

        let err = detector.detect(&blank(64, 64)).unwrap_err();
        assert!(matches!(err, OcrError::Detection(_)));
    }
}
