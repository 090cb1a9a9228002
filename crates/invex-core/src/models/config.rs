//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{InvexError, Result};
use crate::invoice::DateLayout;

/// Main configuration for the invex pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvexConfig {
    /// Text recognition configuration.
    pub recognition: RecognitionConfig,

    /// Image preprocessing configuration.
    pub preprocessing: PreprocessConfig,

    /// Object detection configuration.
    pub detection: DetectionConfig,

    /// Field extraction configuration.
    pub extraction: ExtractionConfig,
}

/// Which engine turns the preprocessed image into text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionEngine {
    /// External Tesseract executable.
    #[default]
    Tesseract,
    /// Built-in ONNX OCR models.
    Onnx,
}

/// Text recognition configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Engine to use.
    pub engine: RecognitionEngine,

    /// Tesseract executable, either a path or a name looked up in `PATH`.
    pub tesseract_cmd: PathBuf,

    /// Tesseract language code(s), e.g. `eng` or `eng+deu`.
    pub language: String,

    /// Tesseract page segmentation mode (`--psm`).
    pub page_segmentation_mode: Option<u8>,

    /// Directory holding the ONNX OCR models and dictionary.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            engine: RecognitionEngine::Tesseract,
            tesseract_cmd: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            page_segmentation_mode: None,
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
        }
    }
}

impl RecognitionConfig {
    /// Get full path to a file in the model directory.
    pub fn model_path(&self, file_name: &str) -> PathBuf {
        self.model_dir.join(file_name)
    }
}

/// Image preprocessing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Gaussian blur kernel size (odd, 1 disables blurring).
    pub blur_kernel: u32,

    /// Neighbourhood size for the adaptive threshold (odd, at least 3).
    pub block_size: u32,

    /// Constant subtracted from the neighbourhood mean.
    pub threshold_offset: f32,

    /// Maximum image dimension (longer side); larger images are downscaled.
    pub max_image_size: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 5,
            block_size: 11,
            threshold_offset: 2.0,
            max_image_size: 4096,
        }
    }
}

/// Object detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Run the detector before recognition.
    pub enabled: bool,

    /// YOLO model file.
    pub model_path: PathBuf,

    /// Square model input size in pixels.
    pub input_size: u32,

    /// Minimum class score (0.0 - 1.0).
    pub confidence_threshold: f32,

    /// IoU above which overlapping boxes of one class are suppressed.
    pub iou_threshold: f32,

    /// Maximum detections kept per image.
    pub max_detections: usize,

    /// Number of CPU threads to use.
    pub num_threads: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model_path: PathBuf::from("models/yolov8n.onnx"),
            input_size: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 100,
            num_threads: 4,
        }
    }
}

/// Field extraction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Accepted date layouts.
    pub date_layout: DateLayout,

    /// Copy the recognized text into the record.
    pub include_raw_text: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            date_layout: DateLayout::Any,
            include_raw_text: true,
        }
    }
}

impl InvexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| InvexError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| InvexError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let pre = &self.preprocessing;
        if pre.blur_kernel == 0 || pre.blur_kernel % 2 == 0 {
            return Err(InvexError::Config(format!(
                "preprocessing.blur_kernel must be odd, got {}",
                pre.blur_kernel
            )));
        }
        if pre.block_size < 3 || pre.block_size % 2 == 0 {
            return Err(InvexError::Config(format!(
                "preprocessing.block_size must be odd and at least 3, got {}",
                pre.block_size
            )));
        }
        if pre.max_image_size == 0 {
            return Err(InvexError::Config(
                "preprocessing.max_image_size must be positive".to_string(),
            ));
        }

        let det = &self.detection;
        for (name, value) in [
            ("confidence_threshold", det.confidence_threshold),
            ("iou_threshold", det.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(InvexError::Config(format!(
                    "detection.{} must be within 0.0 - 1.0, got {}",
                    name, value
                )));
            }
        }
        if det.input_size == 0 || det.input_size % 32 != 0 {
            return Err(InvexError::Config(format!(
                "detection.input_size must be a positive multiple of 32, got {}",
                det.input_size
            )));
        }

        if self.recognition.tesseract_cmd.as_os_str().is_empty() {
            return Err(InvexError::Config(
                "recognition.tesseract_cmd must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = InvexConfig::default();
        config.validate().unwrap();
        assert_eq!(config.recognition.tesseract_cmd, PathBuf::from("tesseract"));
        assert!(!config.detection.enabled);
        assert!(config.extraction.include_raw_text);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{
            "recognition": { "tesseract_cmd": "/opt/tesseract/bin/tesseract" },
            "extraction": { "date_layout": "day_first" }
        }"#;
        let config: InvexConfig = serde_json::from_str(json).unwrap();

        assert_eq!(
            config.recognition.tesseract_cmd,
            PathBuf::from("/opt/tesseract/bin/tesseract")
        );
        assert_eq!(config.recognition.language, "eng");
        assert_eq!(config.extraction.date_layout, DateLayout::DayFirst);
        assert!(config.extraction.include_raw_text);
        assert_eq!(config.preprocessing, PreprocessConfig::default());
    }

    #[test]
    fn test_engine_names() {
        let config: RecognitionConfig = serde_json::from_str(r#"{"engine": "onnx"}"#).unwrap();
        assert_eq!(config.engine, RecognitionEngine::Onnx);
        assert!(serde_json::from_str::<RecognitionConfig>(r#"{"engine": "paddle"}"#).is_err());
    }

    #[test]
    fn test_validate_rejects_even_kernel() {
        let mut config = InvexConfig::default();
        config.preprocessing.blur_kernel = 4;
        assert!(matches!(config.validate(), Err(InvexError::Config(_))));

        let mut config = InvexConfig::default();
        config.preprocessing.block_size = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut config = InvexConfig::default();
        config.detection.iou_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = InvexConfig::default();
        config.recognition.page_segmentation_mode = Some(6);
        config.detection.enabled = true;
        config.save(&path).unwrap();

        assert_eq!(InvexConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_from_file_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(InvexConfig::from_file(&path), Err(InvexError::Config(_))));
    }
}
