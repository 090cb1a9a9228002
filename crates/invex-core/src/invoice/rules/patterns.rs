//! Compiled patterns for invoice field extraction.
//!
//! Every pattern is searched against the whole recognized text and the
//! leftmost match wins. None of them anchor on line boundaries because OCR
//! output rarely keeps the original layout.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // "Invoice #12345", "INVOICE: INV-2024", "invoice#7788"
    pub static ref INVOICE_NUMBER: Regex = Regex::new(
        r"(?i)invoice\s*[:#]?\s*([A-Za-z0-9-]+)"
    ).unwrap();

    // 2024-08-15, 2024/08/15, 2024.08.15, 15-08-2024, 15/08/2024, 15.08.2024
    pub static ref DATE_ANY: Regex = Regex::new(
        r"(\d{4}[-/.]\d{2}[-/.]\d{2}|\d{2}[-/.]\d{2}[-/.]\d{4})"
    ).unwrap();

    // 15-08-2024, 15/08/2024, 15.08.2024 only
    pub static ref DATE_DAY_FIRST: Regex = Regex::new(
        r"(\d{2}[-/.]\d{2}[-/.]\d{4})"
    ).unwrap();

    // "Total: $150.00", "TOTAL ₹ 99.50", "total 99,50"
    pub static ref TOTAL_AMOUNT: Regex = Regex::new(
        r"(?i)total\s*:?\s*[$₹€£]?\s*(\d+[.,]\d{2})"
    ).unwrap();

    // "From: Acme Corp", "Vendor: Smith & Sons, Ltd.", "Company Globex"
    pub static ref VENDOR: Regex = Regex::new(
        r"(?i)(?:from|vendor|company)\s*:?\s*([A-Za-z0-9\s&,.-]+)"
    ).unwrap();
}
