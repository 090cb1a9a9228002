//! Vendor name extraction.

use super::patterns::VENDOR;
use super::{ExtractionMatch, FieldExtractor};

/// Finds the name following "from", "vendor" or "company".
///
/// The captured run may span several lines of OCR output; it is trimmed but
/// otherwise kept as printed. A run that is only whitespace yields an empty
/// name rather than no vendor.
#[derive(Debug, Default, Clone, Copy)]
pub struct VendorExtractor;

impl VendorExtractor {
    pub fn new() -> Self {
        Self
    }

    fn to_match(caps: &regex::Captures<'_>) -> Option<ExtractionMatch<String>> {
        let whole = caps.get(0)?;
        let name = caps.get(1)?.as_str().trim();
        Some(ExtractionMatch::new(
            name.to_string(),
            (whole.start(), whole.end()),
            whole.as_str(),
        ))
    }
}

impl FieldExtractor for VendorExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        // Only the first occurrence is considered, even if it trims to nothing.
        VENDOR.captures(text).and_then(|caps| Self::to_match(&caps))
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        VENDOR
            .captures_iter(text)
            .filter_map(|caps| Self::to_match(&caps))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        let extractor = VendorExtractor::new();
        assert_eq!(extractor.extract("From: Acme Corp").unwrap().value, "Acme Corp");
        assert_eq!(extractor.extract("VENDOR Globex").unwrap().value, "Globex");
        assert_eq!(
            extractor.extract("Company: Smith & Sons, Ltd.").unwrap().value,
            "Smith & Sons, Ltd."
        );
    }

    #[test]
    fn test_trims_surrounding_whitespace() {
        let m = VendorExtractor::new().extract("From:   Acme Corp   ").unwrap();
        assert_eq!(m.value, "Acme Corp");
        assert_eq!(m.source, "From:   Acme Corp   ");
    }

    #[test]
    fn test_run_continues_across_lines() {
        let m = VendorExtractor::new().extract("From: Acme Corp\nBilling Dept: x").unwrap();
        assert_eq!(m.value, "Acme Corp\nBilling Dept");
    }

    #[test]
    fn test_whitespace_only_is_empty() {
        let m = VendorExtractor::new().extract("From: \t ; Acme").unwrap();
        assert_eq!(m.value, "");
        assert_eq!(m.source, "From: \t ");

        let all = VendorExtractor::new().extract_all("From: \t ; Vendor: Acme");
        let values: Vec<&str> = all.iter().map(|m| m.value.as_str()).collect();
        assert_eq!(values, vec!["", "Acme"]);
    }

    #[test]
    fn test_keyword_inside_word_still_matches() {
        // The keyword is not anchored to a word boundary.
        let m = VendorExtractor::new().extract("Fromage: Brie Ltd").unwrap();
        assert_eq!(m.value, "age");
    }

    #[test]
    fn test_no_keyword() {
        assert!(VendorExtractor::new().extract("Invoice #1 Total: 10.00").is_none());
        assert!(VendorExtractor::new().extract_all("").is_empty());
    }
}
