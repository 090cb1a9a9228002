//! ONNX inference layer for invex.
//!
//! Models are run through the [`InferenceBackend`] trait so that the
//! detector in `invex-core` never touches a runtime directly. The `native`
//! feature provides [`OrtBackend`], backed by ONNX Runtime with the XNNPACK
//! execution provider.

mod backend;
mod error;
mod tensor;

pub use backend::InferenceBackend;
pub use error::InferenceError;
pub use tensor::{InputTensor, OutputTensor, TensorType};

#[cfg(feature = "native")]
pub use backend::ort::{OrtBackend, OrtOptions};

/// Result type for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;
