//! Rule-based field extractors.

pub mod amounts;
pub mod dates;
pub mod invoice_number;
pub mod patterns;
pub mod vendor;

pub use amounts::AmountExtractor;
pub use dates::{DateExtractor, DateLayout};
pub use invoice_number::InvoiceNumberExtractor;
pub use vendor::VendorExtractor;

use regex::{Captures, Regex};

/// A single pattern-based field rule.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// First match in document order, if any.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Every non-overlapping match in document order.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// A value pulled out of the source text together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Byte span of the whole pattern match in the source text.
    pub position: (usize, usize),
    /// The whole matched substring, including any label.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, position: (usize, usize), source: impl Into<String>) -> Self {
        Self {
            value,
            position,
            source: source.into(),
        }
    }

    /// Replace the value, keeping position and source.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ExtractionMatch<U> {
        ExtractionMatch {
            value: f(self.value),
            position: self.position,
            source: self.source,
        }
    }
}

/// Turn capture group `group` of a match into an [`ExtractionMatch`].
fn capture_to_match(caps: &Captures<'_>, group: usize) -> Option<ExtractionMatch<String>> {
    let whole = caps.get(0)?;
    let value = caps.get(group)?;
    Some(ExtractionMatch::new(
        value.as_str().to_string(),
        (whole.start(), whole.end()),
        whole.as_str(),
    ))
}

/// First match of `re` in `text`, reporting capture group `group`.
pub(crate) fn first_capture(re: &Regex, text: &str, group: usize) -> Option<ExtractionMatch<String>> {
    re.captures(text).and_then(|caps| capture_to_match(&caps, group))
}

/// All non-overlapping matches of `re` in `text`, reporting capture group `group`.
pub(crate) fn all_captures(re: &Regex, text: &str, group: usize) -> Vec<ExtractionMatch<String>> {
    re.captures_iter(text)
        .filter_map(|caps| capture_to_match(&caps, group))
        .collect()
}
