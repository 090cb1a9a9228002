//! Invoice number extraction.

use super::patterns::INVOICE_NUMBER;
use super::{all_captures, first_capture, ExtractionMatch, FieldExtractor};

/// Finds the token following the word "invoice".
///
/// The token is kept verbatim: letters, digits and hyphens only, so
/// `INV/2024/001` yields `INV`.
#[derive(Debug, Default, Clone, Copy)]
pub struct InvoiceNumberExtractor;

impl InvoiceNumberExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl FieldExtractor for InvoiceNumberExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        first_capture(&INVOICE_NUMBER, text, 1)
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        all_captures(&INVOICE_NUMBER, text, 1)
    }
}
