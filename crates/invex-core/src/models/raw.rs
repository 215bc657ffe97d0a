//! Backend output shapes, consumed only by the normalizer.

use serde_json::{Map, Value};

/// What an adapter produced for one page, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    /// Plain text from OCR or a PDF text layer.
    Text { text: String },

    /// Model response that was not a JSON object.
    Unparsed { text: String },

    /// Parsed model response.
    Json(Map<String, Value>),

    /// Typed entities and tables projected onto one page.
    Entities {
        entities: Vec<Entity>,
        tables: Vec<Table>,
        text: String,
    },

    /// Backend call failed.
    Failed { message: String },
}

impl RawOutput {
    pub fn failed(message: impl Into<String>) -> Self {
        RawOutput::Failed {
            message: message.into(),
        }
    }

    /// Free text usable for regex fallback, if this variant carries any.
    pub fn text(&self) -> Option<&str> {
        match self {
            RawOutput::Text { text } | RawOutput::Entities { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Raw output tagged with the page number its backend reported.
#[derive(Debug, Clone, PartialEq)]
pub struct PageOutput {
    /// Page number (1-indexed).
    pub page: u32,
    pub raw: RawOutput,
}

impl PageOutput {
    pub fn new(page: u32, raw: RawOutput) -> Self {
        Self { page, raw }
    }
}

/// A labeled span reported by a document-AI processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    /// Entity type, e.g. `invoice_date`.
    pub kind: String,
    /// Text the entity covers.
    pub mention_text: String,
}

impl Entity {
    pub fn new(kind: impl Into<String>, mention_text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            mention_text: mention_text.into(),
        }
    }
}

/// A table with its cell texts already resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header_rows: Vec<Vec<String>>,
    pub body_rows: Vec<Vec<String>>,
}

impl Table {
    /// Header cells used for column matching (first header row).
    pub fn headers(&self) -> &[String] {
        self.header_rows.first().map(Vec::as_slice).unwrap_or(&[])
    }
}
