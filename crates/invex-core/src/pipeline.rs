//! End-to-end document processing: image in, extracted record out.

use std::path::Path;
use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{InvexError, Result};
use crate::invoice::FieldParser;
use crate::models::config::InvexConfig;
use crate::models::record::{ExtractedRecord, FIELD_NAMES};
use crate::ocr::{create_recognizer, Detection, ImagePreprocessor, ObjectDetector, TextRecognizer};
use invex_inference::InferenceBackend;

/// Detector type held by the pipeline.
pub type BoxedDetector = ObjectDetector<Box<dyn InferenceBackend>>;

/// Wall-clock time spent in each stage, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimings {
    pub detection_ms: u64,
    pub preprocessing_ms: u64,
    pub recognition_ms: u64,
    pub extraction_ms: u64,
    pub total_ms: u64,
}

/// Result of processing one document image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResult {
    /// Extracted fields.
    pub record: ExtractedRecord,
    /// Objects found by the detector; empty when detection is disabled.
    pub detections: Vec<Detection>,
    /// Original image dimensions (width, height).
    pub image_size: (u32, u32),
    /// Name of the recognizer that produced the text.
    pub recognizer: String,
    pub timings: StageTimings,
}

/// Detection, preprocessing, recognition and field extraction in sequence.
///
/// Detection results are reported alongside the record but the full image is
/// always what gets recognized.
pub struct DocumentPipeline {
    detector: Option<BoxedDetector>,
    preprocessor: ImagePreprocessor,
    recognizer: Box<dyn TextRecognizer>,
    parser: FieldParser,
}

/// Builder for [`DocumentPipeline`].
#[derive(Default)]
pub struct DocumentPipelineBuilder {
    detector: Option<BoxedDetector>,
    preprocessor: Option<ImagePreprocessor>,
    recognizer: Option<Box<dyn TextRecognizer>>,
    parser: Option<FieldParser>,
}

impl DocumentPipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the text recognizer (required).
    pub fn with_recognizer(mut self, recognizer: Box<dyn TextRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// Enable object detection.
    pub fn with_detector(mut self, detector: BoxedDetector) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn with_preprocessor(mut self, preprocessor: ImagePreprocessor) -> Self {
        self.preprocessor = Some(preprocessor);
        self
    }

    pub fn with_parser(mut self, parser: FieldParser) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Build the pipeline.
    pub fn build(self) -> Result<DocumentPipeline> {
        let recognizer = self
            .recognizer
            .ok_or_else(|| InvexError::Config("no text recognizer configured".to_string()))?;

        Ok(DocumentPipeline {
            detector: self.detector,
            preprocessor: self.preprocessor.unwrap_or_default(),
            recognizer,
            parser: self.parser.unwrap_or_default(),
        })
    }
}

impl DocumentPipeline {
    pub fn builder() -> DocumentPipelineBuilder {
        DocumentPipelineBuilder::new()
    }

    /// Wire every stage from configuration.
    pub fn from_config(config: &InvexConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = Self::builder()
            .with_recognizer(create_recognizer(&config.recognition)?)
            .with_preprocessor(ImagePreprocessor::from_config(&config.preprocessing))
            .with_parser(FieldParser::from_config(&config.extraction));

        if config.detection.enabled {
            builder = builder.with_detector(load_detector(config)?);
        }

        builder.build()
    }

    /// Whether object detection runs before recognition.
    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }

    pub fn recognizer_name(&self) -> &str {
        self.recognizer.name()
    }

    /// Process a decoded image.
    pub fn process_image(&self, image: &DynamicImage) -> Result<DocumentResult> {
        let start = Instant::now();
        let (width, height) = image.dimensions();
        let mut timings = StageTimings::default();

        info!("Processing image: {}x{}", width, height);

        let stage = Instant::now();
        let detections = match &self.detector {
            Some(detector) => detector.detect(image)?,
            None => Vec::new(),
        };
        timings.detection_ms = stage.elapsed().as_millis() as u64;

        let stage = Instant::now();
        let binary = self.preprocessor.preprocess(image)?;
        timings.preprocessing_ms = stage.elapsed().as_millis() as u64;
        debug!(
            "Preprocessed to {}x{} in {}ms",
            binary.width(),
            binary.height(),
            timings.preprocessing_ms
        );

        let stage = Instant::now();
        let text = self.recognizer.recognize(&binary)?;
        timings.recognition_ms = stage.elapsed().as_millis() as u64;
        debug!(
            "Recognized {} characters with {} in {}ms",
            text.len(),
            self.recognizer.name(),
            timings.recognition_ms
        );

        let extraction = self.parser.parse(&text);
        timings.extraction_ms = extraction.processing_time_ms;
        timings.total_ms = start.elapsed().as_millis() as u64;

        info!(
            "Extracted {} of {} fields in {}ms",
            FIELD_NAMES.len() - extraction.missing_fields.len(),
            FIELD_NAMES.len(),
            timings.total_ms
        );

        Ok(DocumentResult {
            record: extraction.record,
            detections,
            image_size: (width, height),
            recognizer: self.recognizer.name().to_string(),
            timings,
        })
    }

    /// Decode and process an encoded image.
    pub fn process_bytes(&self, bytes: &[u8]) -> Result<DocumentResult> {
        let image = image::load_from_memory(bytes)?;
        self.process_image(&image)
    }

    /// Read, decode and process an image file.
    pub fn process_file(&self, path: &Path) -> Result<DocumentResult> {
        debug!("Reading {}", path.display());
        let bytes = std::fs::read(path)?;
        self.process_bytes(&bytes)
    }
}

#[cfg(feature = "native")]
fn load_detector(config: &InvexConfig) -> Result<BoxedDetector> {
    use invex_inference::{OrtBackend, OrtOptions};

    let options = OrtOptions {
        intra_threads: config.detection.num_threads,
        ..Default::default()
    };
    let backend = OrtBackend::from_file_with_options(&config.detection.model_path, &options)?;
    info!("Loaded detection model {}", config.detection.model_path.display());

    Ok(ObjectDetector::from_config(
        Box::new(backend) as Box<dyn InferenceBackend>,
        &config.detection,
    ))
}

#[cfg(not(feature = "native"))]
fn load_detector(_config: &InvexConfig) -> Result<BoxedDetector> {
    Err(InvexError::Config(
        "object detection requires the `native` feature".to_string(),
    ))
}
