//! Date extraction.
//!
//! Dates are returned exactly as printed. Nothing checks that the digits form
//! a real calendar date and no layout is normalized into another.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::patterns::{DATE_ANY, DATE_DAY_FIRST};
use super::{all_captures, first_capture, ExtractionMatch, FieldExtractor};

/// Which printed date layouts are recognized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateLayout {
    /// `YYYY-MM-DD` or `DD-MM-YYYY`, with `-`, `/` or `.` separators.
    #[default]
    Any,
    /// Only `DD-MM-YYYY`, with `-`, `/` or `.` separators.
    DayFirst,
}

impl DateLayout {
    fn pattern(self) -> &'static Regex {
        match self {
            DateLayout::Any => &DATE_ANY,
            DateLayout::DayFirst => &DATE_DAY_FIRST,
        }
    }
}

/// Date field extractor.
#[derive(Debug, Default, Clone, Copy)]
pub struct DateExtractor {
    layout: DateLayout,
}

impl DateExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict or widen the accepted layouts.
    pub fn with_layout(mut self, layout: DateLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn layout(&self) -> DateLayout {
        self.layout
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        first_capture(self.layout.pattern(), text, 1)
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        all_captures(self.layout.pattern(), text, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_first() {
        let m = DateExtractor::new().extract("Date: 2024-08-15").unwrap();
        assert_eq!(m.value, "2024-08-15");
    }

    #[test]
    fn test_day_first_with_slashes_and_dots() {
        let extractor = DateExtractor::new();
        assert_eq!(extractor.extract("on 20/10/2023").unwrap().value, "20/10/2023");
        assert_eq!(extractor.extract("on 20.10.2023").unwrap().value, "20.10.2023");
    }

    #[test]
    fn test_mixed_separators_are_kept_verbatim() {
        let m = DateExtractor::new().extract("2024/08.15").unwrap();
        assert_eq!(m.value, "2024/08.15");
    }

    #[test]
    fn test_not_validated_as_calendar_date() {
        let m = DateExtractor::new().extract("99-99-2024").unwrap();
        assert_eq!(m.value, "99-99-2024");
    }

    #[test]
    fn test_earliest_position_wins_across_layouts() {
        let text = "Due 31.12.2024, issued 2024-12-01";
        assert_eq!(DateExtractor::new().extract(text).unwrap().value, "31.12.2024");
    }

    #[test]
    fn test_day_first_layout_skips_iso_dates() {
        let text = "Issued 2024-12-01, due 31.12.2024";
        let extractor = DateExtractor::new().with_layout(DateLayout::DayFirst);

        assert_eq!(extractor.extract(text).unwrap().value, "31.12.2024");
        assert_eq!(extractor.extract_all(text).len(), 1);
    }

    #[test]
    fn test_single_digit_parts_do_not_match() {
        assert!(DateExtractor::new().extract("1/8/2024").is_none());
    }
}
