//! Error types for the invex-core library.

use thiserror::Error;

/// Main error type for the invex library.
#[derive(Error, Debug)]
pub enum InvexError {
    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Inference error from the inference layer.
    #[error("inference error: {0}")]
    Inference(#[from] invex_inference::InferenceError),

    /// Image decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors from the image, detection and recognition stages.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load a model.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Object detection failed.
    #[error("detection failed: {0}")]
    Detection(String),

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Image preprocessing failed.
    #[error("preprocessing failed: {0}")]
    Preprocessing(String),

    /// Invalid image format or dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The recognition engine executable could not be started.
    #[error("recognition engine not found: {0}")]
    EngineNotFound(String),
}

/// Result type for the invex library.
pub type Result<T> = std::result::Result<T, InvexError>;
