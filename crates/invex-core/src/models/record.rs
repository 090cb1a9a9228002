//! The structured record produced from recognized text.

use serde::{Deserialize, Serialize};

/// Names of the extracted fields, in output order.
pub const FIELD_NAMES: [&str; 4] = ["invoice_number", "date", "total_amount", "vendor"];

/// Fields pulled out of a document's recognized text.
///
/// Each field is either the substring that matched or `None`. Values are
/// never validated or normalized: a `date` need not be a real calendar date
/// and a `total_amount` keeps its decimal comma. Every key is serialized,
/// absent values as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub invoice_number: Option<String>,
    pub date: Option<String>,
    pub total_amount: Option<String>,
    pub vendor: Option<String>,
    /// The text the fields were extracted from, when the policy keeps it.
    pub raw_text: Option<String>,
}

impl ExtractedRecord {
    /// Look up one of the four extracted fields by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "invoice_number" => self.invoice_number.as_deref(),
            "date" => self.date.as_deref(),
            "total_amount" => self.total_amount.as_deref(),
            "vendor" => self.vendor.as_deref(),
            _ => None,
        }
    }

    /// Names of the extracted fields that found no match.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        FIELD_NAMES
            .iter()
            .copied()
            .filter(|name| self.field(name).is_none())
            .collect()
    }

    /// True when none of the four fields matched.
    pub fn is_empty(&self) -> bool {
        self.missing_fields().len() == FIELD_NAMES.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_absent_fields_serialize_as_null() {
        let record = ExtractedRecord {
            invoice_number: Some("7788".to_string()),
            ..Default::default()
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "invoice_number": "7788",
                "date": null,
                "total_amount": null,
                "vendor": null,
                "raw_text": null,
            })
        );
    }

    #[test]
    fn test_missing_fields() {
        let record = ExtractedRecord {
            date: Some("2024-08-15".to_string()),
            vendor: Some("Acme".to_string()),
            ..Default::default()
        };

        assert_eq!(record.missing_fields(), vec!["invoice_number", "total_amount"]);
        assert!(!record.is_empty());
        assert!(ExtractedRecord::default().is_empty());
    }

    #[test]
    fn test_field_lookup_ignores_raw_text() {
        let record = ExtractedRecord {
            raw_text: Some("hello".to_string()),
            ..Default::default()
        };
        assert_eq!(record.field("raw_text"), None);
        assert_eq!(record.field("nonsense"), None);
    }
}
