//! Total amount extraction.

use super::patterns::TOTAL_AMOUNT;
use super::{all_captures, first_capture, ExtractionMatch, FieldExtractor};

/// Finds the amount printed after the word "total".
///
/// The numeric string is returned as printed; a decimal comma stays a comma.
#[derive(Debug, Default, Clone, Copy)]
pub struct AmountExtractor;

impl AmountExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl FieldExtractor for AmountExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        first_capture(&TOTAL_AMOUNT, text, 1)
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        all_captures(&TOTAL_AMOUNT, text, 1)
    }
}
