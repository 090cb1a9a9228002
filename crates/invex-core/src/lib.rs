//! Core library for extracting invoice fields from document images.
//!
//! This crate provides:
//! - Rule-based field extraction (invoice number, date, total amount, vendor)
//! - Image preprocessing (grayscale, Gaussian blur, adaptive threshold)
//! - Optional YOLO object detection through `invex-inference`
//! - Text recognition via Tesseract or pure Rust ONNX OCR
//! - A [`DocumentPipeline`] wiring the stages together from [`InvexConfig`]

pub mod error;
pub mod invoice;
pub mod models;
pub mod ocr;
pub mod pipeline;

pub use error::{InvexError, OcrError, Result};
pub use invoice::{extract_fields, DateLayout, ExtractionResult, FieldParser};
pub use models::{ExtractedRecord, InvexConfig};
pub use ocr::{
    create_recognizer, Detection, FixedTextRecognizer, ImagePreprocessor, ObjectDetector,
    TesseractRecognizer, TextRecognizer,
};
#[cfg(feature = "native")]
pub use ocr::PureOcrEngine;
pub use pipeline::{DocumentPipeline, DocumentPipelineBuilder, DocumentResult, StageTimings};

/// Re-export inference types.
pub use invex_inference::{InferenceBackend, InputTensor, OutputTensor};

#[cfg(feature = "native")]
pub use invex_inference::OrtBackend;
