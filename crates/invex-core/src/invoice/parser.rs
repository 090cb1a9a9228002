//! Rule-based parser turning recognized text into an [`ExtractedRecord`].

use std::time::Instant;

use tracing::{debug, info, trace};

use crate::models::config::ExtractionConfig;
use crate::models::record::ExtractedRecord;

use super::rules::{
    AmountExtractor, DateExtractor, DateLayout, ExtractionMatch, FieldExtractor,
    InvoiceNumberExtractor, VendorExtractor,
};

/// Result of parsing one document's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    /// Extracted fields.
    pub record: ExtractedRecord,
    /// Names of the fields that found no match.
    pub missing_fields: Vec<&'static str>,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Field parser applying one independent rule per field.
///
/// Every rule searches the whole text and keeps its first match. A rule that
/// finds nothing leaves its field `None` and has no effect on the others, so
/// parsing never fails.
#[derive(Debug, Clone)]
pub struct FieldParser {
    invoice_number: InvoiceNumberExtractor,
    date: DateExtractor,
    total_amount: AmountExtractor,
    vendor: VendorExtractor,
    include_raw_text: bool,
}

impl FieldParser {
    /// Create a parser accepting both date layouts and keeping the raw text.
    pub fn new() -> Self {
        Self {
            invoice_number: InvoiceNumberExtractor::new(),
            date: DateExtractor::new(),
            total_amount: AmountExtractor::new(),
            vendor: VendorExtractor::new(),
            include_raw_text: true,
        }
    }

    /// Create a parser from the extraction section of the configuration.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new()
            .with_date_layout(config.date_layout)
            .with_raw_text(config.include_raw_text)
    }

    /// Set which date layouts are recognized.
    pub fn with_date_layout(mut self, layout: DateLayout) -> Self {
        self.date = self.date.with_layout(layout);
        self
    }

    /// Set whether the input text is copied into the record.
    pub fn with_raw_text(mut self, include: bool) -> Self {
        self.include_raw_text = include;
        self
    }

    /// Extract all fields from `text`.
    pub fn extract(&self, text: &str) -> ExtractedRecord {
        ExtractedRecord {
            invoice_number: Self::first(&self.invoice_number, "invoice_number", text),
            date: Self::first(&self.date, "date", text),
            total_amount: Self::first(&self.total_amount, "total_amount", text),
            vendor: Self::first(&self.vendor, "vendor", text),
            raw_text: self.include_raw_text.then(|| text.to_string()),
        }
    }

    /// Extract all fields and report which ones are missing.
    pub fn parse(&self, text: &str) -> ExtractionResult {
        let start = Instant::now();

        info!("Parsing fields from {} characters of text", text.len());

        let record = self.extract(text);
        let missing_fields = record.missing_fields();

        if !missing_fields.is_empty() {
            debug!("No match for: {}", missing_fields.join(", "));
        }

        ExtractionResult {
            record,
            missing_fields,
            processing_time_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn first<E>(extractor: &E, field: &str, text: &str) -> Option<String>
    where
        E: FieldExtractor<Output = ExtractionMatch<String>>,
    {
        let m = extractor.extract(text)?;
        trace!("{} = {:?} at {:?}", field, m.value, m.position);
        Some(m.value)
    }
}

impl Default for FieldParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract fields from `text` with the default policy.
pub fn extract_fields(text: &str) -> ExtractedRecord {
    FieldParser::new().extract(text)
}
