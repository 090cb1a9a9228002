//! Image stages of the pipeline: preprocessing, object detection and text recognition.

mod detector;
mod preprocessing;
#[cfg(feature = "native")]
mod pure_engine;
mod tesseract;

pub use detector::{Detection, ObjectDetector};
pub use preprocessing::{ImagePreprocessor, Letterbox};
#[cfg(feature = "native")]
pub use pure_engine::PureOcrEngine;
pub use tesseract::TesseractRecognizer;

use image::GrayImage;
use tracing::info;

use crate::error::OcrError;
use crate::models::config::{RecognitionConfig, RecognitionEngine};

/// Turns a preprocessed page image into text.
pub trait TextRecognizer: Send + Sync {
    /// Short engine name for logs and reports.
    fn name(&self) -> &str;

    /// Recognize all text on the page, lines separated by newlines.
    fn recognize(&self, image: &GrayImage) -> Result<String, OcrError>;
}

/// Recognizer that ignores the image and returns preset text.
#[derive(Debug, Clone, Default)]
pub struct FixedTextRecognizer {
    text: String,
}

impl FixedTextRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl TextRecognizer for FixedTextRecognizer {
    fn name(&self) -> &str {
        "fixed"
    }

    fn recognize(&self, _image: &GrayImage) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}

/// Create the recognizer selected by configuration.
pub fn create_recognizer(config: &RecognitionConfig) -> Result<Box<dyn TextRecognizer>, OcrError> {
    let recognizer: Box<dyn TextRecognizer> = match config.engine {
        RecognitionEngine::Tesseract => Box::new(TesseractRecognizer::from_config(config)),
        #[cfg(feature = "native")]
        RecognitionEngine::Onnx => Box::new(PureOcrEngine::from_config(config)?),
        #[cfg(not(feature = "native"))]
        RecognitionEngine::Onnx => {
            return Err(OcrError::ModelLoad(
                "ONNX recognition requires the `native` feature".to_string(),
            ));
        }
    };

    info!("Using {} text recognizer", recognizer.name());
    Ok(recognizer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_fixed_recognizer() {
        let recognizer = FixedTextRecognizer::new("Invoice #1");
        let image = GrayImage::from_pixel(2, 2, Luma([0]));
        assert_eq!(recognizer.recognize(&image).unwrap(), "Invoice #1");
        assert_eq!(recognizer.name(), "fixed");
    }

    #[test]
    fn test_create_tesseract_recognizer() {
        let recognizer = create_recognizer(&RecognitionConfig::default()).unwrap();
        assert_eq!(recognizer.name(), "tesseract");
    }

    #[test]
    fn test_create_onnx_recognizer_without_models() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecognitionConfig {
            engine: RecognitionEngine::Onnx,
            model_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(matches!(create_recognizer(&config), Err(OcrError::ModelLoad(_))));
    }
}
