//! Error types for the inference layer.

use thiserror::Error;

/// Errors that can occur while loading or running an ONNX model.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// The model file could not be parsed.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// The runtime refused to build a session.
    #[error("failed to create session: {0}")]
    SessionCreate(String),

    /// Input tensor had the wrong shape or element type.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The model ran but returned an error.
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    /// An output tensor could not be converted.
    #[error("failed to extract output: {0}")]
    OutputExtraction(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
