//! Canonical invoice records produced by every extraction backend.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::Strategy;

/// Normalized invoice data for a single page, independent of the backend.
///
/// Typed fields are kept as the raw strings the backend reported; dates and
/// amounts come in too many shapes to parse reliably here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Page number (1-indexed).
    pub page: u32,

    /// Invoice date as found in the document.
    pub date: Option<String>,

    /// Vendor/supplier name.
    pub vendor_name: Option<String>,

    /// Invoice or reference number.
    pub invoice_number: Option<String>,

    /// Total amount, currency symbols left in place.
    pub total_amount: Option<String>,

    /// Currency code or symbol.
    pub currency: Option<String>,

    /// Line items in table/row order.
    pub line_items: Vec<LineItem>,

    /// How the page was produced.
    pub status: ExtractionStatus,

    /// Free text kept for text-only and degraded pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,

    /// Failure detail for degraded pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl InvoiceRecord {
    /// Create an empty successful record for a page.
    pub fn new(page: u32) -> Self {
        Self {
            page,
            date: None,
            vendor_name: None,
            invoice_number: None,
            total_amount: None,
            currency: None,
            line_items: Vec::new(),
            status: ExtractionStatus::Success,
            raw_text: None,
            error_message: None,
        }
    }

    /// Create a degraded record with every typed field left null.
    pub fn degraded(page: u32, status: ExtractionStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            error_message: Some(message.into()),
            ..Self::new(page)
        }
    }

    /// Whether none of the typed header fields were populated.
    pub fn is_blank(&self) -> bool {
        self.date.is_none()
            && self.vendor_name.is_none()
            && self.invoice_number.is_none()
            && self.total_amount.is_none()
            && self.currency.is_none()
            && self.line_items.is_empty()
    }

    /// Number of header fields found (date, vendor, number, total, currency).
    pub fn found_fields(&self) -> usize {
        [
            &self.date,
            &self.vendor_name,
            &self.invoice_number,
            &self.total_amount,
            &self.currency,
        ]
        .iter()
        .filter(|f| f.is_some())
        .count()
    }
}

/// A single invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Item description.
    pub description: String,

    /// Amount as reported, not validated.
    pub amount: String,
}

impl LineItem {
    pub fn new(description: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            amount: amount.into(),
        }
    }
}

/// Outcome marker attached to every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    /// Backend answered and its output was mapped.
    Success,
    /// Backend answered with something that was not structured data.
    Unparsed,
    /// Backend call failed.
    Error,
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStatus::Success => "success",
            ExtractionStatus::Unparsed => "unparsed",
            ExtractionStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered per-page records for one source document.
///
/// Pages are numbered 1..=N without gaps. The records are fully
/// materialized, so the result can be iterated any number of times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Document the records were extracted from.
    pub source: PathBuf,

    /// Backend that produced the records.
    pub strategy: Strategy,

    /// One record per page.
    pub pages: Vec<InvoiceRecord>,
}

impl ExtractionResult {
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InvoiceRecord> {
        self.pages.iter()
    }

    /// Records that were produced without a backend failure.
    pub fn successful(&self) -> impl Iterator<Item = &InvoiceRecord> {
        self.pages
            .iter()
            .filter(|p| p.status == ExtractionStatus::Success)
    }

    /// Count of degraded (unparsed or failed) pages.
    pub fn degraded_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.status != ExtractionStatus::Success)
            .count()
    }
}

impl<'a> IntoIterator for &'a ExtractionResult {
    type Item = &'a InvoiceRecord;
    type IntoIter = std::slice::Iter<'a, InvoiceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.iter()
    }
}

impl IntoIterator for ExtractionResult {
    type Item = InvoiceRecord;
    type IntoIter = std::vec::IntoIter<InvoiceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_degraded_record_has_null_fields() {
        let record = InvoiceRecord::degraded(3, ExtractionStatus::Error, "timeout");
        assert_eq!(record.page, 3);
        assert!(record.is_blank());
        assert_eq!(record.status, ExtractionStatus::Error);
        assert_eq!(record.error_message.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_record_serializes_explicit_nulls() {
        let record = InvoiceRecord::new(1);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["date"], serde_json::Value::Null);
        assert_eq!(json["status"], "success");
        assert!(json.get("raw_text").is_none());
    }

    #[test]
    fn test_result_is_restartable() {
        let result = ExtractionResult {
            source: PathBuf::from("a.pdf"),
            strategy: Strategy::LocalOcr,
            pages: vec![InvoiceRecord::new(1), InvoiceRecord::new(2)],
        };

        let first: Vec<u32> = result.iter().map(|r| r.page).collect();
        let second: Vec<u32> = (&result).into_iter().map(|r| r.page).collect();
        assert_eq!(first, second);
        assert_eq!(result.len(), 2);
    }
}
