//! Maps every backend's raw output onto [`InvoiceRecord`].

pub mod rules;
pub mod tables;

use serde_json::{Map, Value};
use tracing::debug;

use crate::models::config::ExtractionConfig;
use crate::models::invoice::{ExtractionStatus, InvoiceRecord, LineItem};
use crate::models::raw::RawOutput;

/// Error message attached to pages whose model reply was not JSON.
pub const UNPARSED_MESSAGE: &str = "could not parse model response as JSON";

/// Stateless converter from [`RawOutput`] to [`InvoiceRecord`].
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    regex_fallback: bool,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            regex_fallback: true,
        }
    }
}

impl Normalizer {
    pub fn new(regex_fallback: bool) -> Self {
        Self { regex_fallback }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.regex_fallback)
    }

    /// Build the record for one page.
    ///
    /// Entity mapping and the regex fallback only apply to the first page of
    /// a document; later pages keep their text and line items only.
    pub fn normalize(&self, raw: &RawOutput, page: u32, is_first_page: bool) -> InvoiceRecord {
        let mut record = match raw {
            RawOutput::Text { text } => InvoiceRecord {
                raw_text: Some(text.clone()),
                ..InvoiceRecord::new(page)
            },
            RawOutput::Unparsed { text } => InvoiceRecord {
                raw_text: Some(text.clone()),
                ..InvoiceRecord::degraded(page, ExtractionStatus::Unparsed, UNPARSED_MESSAGE)
            },
            RawOutput::Json(map) => from_json(map, page),
            RawOutput::Entities {
                entities, tables, ..
            } => {
                let mut record = InvoiceRecord::new(page);
                if is_first_page {
                    rules::apply_entity_rules(entities, &mut record);
                }
                record.line_items = tables::line_items(tables);
                record
            }
            RawOutput::Failed { message } => {
                InvoiceRecord::degraded(page, ExtractionStatus::Error, message.as_str())
            }
        };

        if self.regex_fallback && is_first_page {
            if let Some(text) = raw.text() {
                rules::apply_text_fallback(text, &mut record);
            }
        }

        debug!(
            "Page {} normalized: {} fields, {} line items, status {}",
            page,
            record.found_fields(),
            record.line_items.len(),
            record.status
        );

        record
    }
}

fn from_json(map: &Map<String, Value>, page: u32) -> InvoiceRecord {
    let field = |key: &str| map.get(key).and_then(scalar);

    let line_items = match map.get("costs") {
        Some(Value::Array(costs)) => costs
            .iter()
            .filter_map(Value::as_object)
            .map(|cost| {
                let text = |key: &str| cost.get(key).and_then(scalar).unwrap_or_default();
                LineItem::new(text("description"), text("amount"))
            })
            .collect(),
        _ => Vec::new(),
    };

    InvoiceRecord {
        date: field("date"),
        total_amount: field("total_amount"),
        vendor_name: field("vendor_name"),
        invoice_number: field("invoice_number"),
        currency: field("currency"),
        line_items,
        ..InvoiceRecord::new(page)
    }
}

/// Strings verbatim, numbers and booleans stringified, everything else absent.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
