//! Inference backend implementations.

#[cfg(feature = "native")]
pub mod ort;

use crate::{InputTensor, OutputTensor, Result};

/// A loaded model that can be run on named input tensors.
///
/// Implementations must be shareable across threads; runtimes that need
/// exclusive access to their session are expected to lock internally.
pub trait InferenceBackend: Send + Sync {
    /// Run the model and return its outputs in declaration order.
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>>;

    /// Input names declared by the model.
    fn input_names(&self) -> &[String];

    /// Output names declared by the model.
    fn output_names(&self) -> &[String];
}

impl<T: InferenceBackend + ?Sized> InferenceBackend for Box<T> {
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>> {
        (**self).run(inputs)
    }

    fn input_names(&self) -> &[String] {
        (**self).input_names()
    }

    fn output_names(&self) -> &[String] {
        (**self).output_names()
    }
}
