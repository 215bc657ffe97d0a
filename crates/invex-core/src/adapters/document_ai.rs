//! Managed document-AI adapter.
//!
//! Unlike the page adapters, the processor takes the whole file in one call
//! and answers with a typed document: shared full text, per-page layouts and
//! tables, and document-level entities. [`DocumentAiAdapter`] projects that
//! document into one [`RawOutput::Entities`] per page, numbered by the
//! page numbers the service reports.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use crate::error::{BackendError, InvexError};
use crate::models::config::DocumentAiConfig;
use crate::models::raw::{Entity, PageOutput, RawOutput, Table};

/// Remote document processor.
pub trait DocumentAiClient {
    /// Process a whole file and return the typed document.
    fn process(&self, content: &[u8], mime_type: &str) -> Result<ProcessedDocument, BackendError>;
}

/// Processed document as returned by the service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessedDocument {
    pub text: String,
    pub pages: Vec<DocumentPage>,
    pub entities: Vec<DocumentEntity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentPage {
    /// 1-based page number assigned by the service.
    pub page_number: Option<u32>,
    pub layout: Option<Layout>,
    pub tables: Vec<DocumentTable>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentTable {
    pub header_rows: Vec<TableRow>,
    pub body_rows: Vec<TableRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TableCell {
    pub layout: Option<Layout>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Layout {
    pub text_anchor: Option<TextAnchor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextAnchor {
    pub text_segments: Vec<TextSegment>,
}

/// Half-open character range into [`ProcessedDocument::text`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextSegment {
    #[serde(deserialize_with = "de_index")]
    pub start_index: Option<usize>,
    #[serde(deserialize_with = "de_index")]
    pub end_index: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub mention_text: Option<String>,
}

/// int64 fields arrive as JSON strings; accept plain numbers too.
fn de_index<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Index {
        Number(u64),
        Text(String),
    }

    match Option::<Index>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Index::Number(n)) => Ok(Some(n as usize)),
        Some(Index::Text(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

impl ProcessedDocument {
    /// Resolve a text anchor against the shared document text, trimmed.
    pub fn anchor_text(&self, anchor: Option<&TextAnchor>) -> String {
        DocumentText::new(&self.text).anchor(anchor)
    }

    /// One [`RawOutput::Entities`] per page; a document without pages
    /// still yields one.
    ///
    /// Pages keep the service's `pageNumber`, falling back to their position.
    pub fn project(&self) -> Vec<PageOutput> {
        let entities: Vec<Entity> = self
            .entities
            .iter()
            .map(|e| Entity::new(e.kind.as_str(), e.mention_text.clone().unwrap_or_default()))
            .collect();

        if self.pages.is_empty() {
            return vec![PageOutput::new(
                1,
                RawOutput::Entities {
                    entities,
                    tables: Vec::new(),
                    text: self.text.trim().to_string(),
                },
            )];
        }

        let text = DocumentText::new(&self.text);
        self.pages
            .iter()
            .zip(1u32..)
            .map(|(page, position)| {
                PageOutput::new(
                    page.page_number.unwrap_or(position),
                    RawOutput::Entities {
                        entities: entities.clone(),
                        tables: page.tables.iter().map(|t| text.table(t)).collect(),
                        text: text.layout(page.layout.as_ref()),
                    },
                )
            })
            .collect()
    }
}

/// Document text with a character-to-byte offset table built once.
struct DocumentText<'a> {
    text: &'a str,
    /// Byte offset of every character, plus the text length.
    offsets: Vec<usize>,
}

impl<'a> DocumentText<'a> {
    fn new(text: &'a str) -> Self {
        let offsets = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        Self { text, offsets }
    }

    /// Slice by character positions, clamped to the text length.
    fn slice(&self, start: usize, end: usize) -> &'a str {
        let last = self.offsets.len() - 1;
        let byte_at = |n: usize| self.offsets[n.min(last)];
        &self.text[byte_at(start)..byte_at(end)]
    }

    fn anchor(&self, anchor: Option<&TextAnchor>) -> String {
        let Some(anchor) = anchor else {
            return String::new();
        };

        let mut resolved = String::new();
        for segment in &anchor.text_segments {
            let start = segment.start_index.unwrap_or(0);
            let end = segment.end_index.unwrap_or(0);
            if end > start {
                resolved.push_str(self.slice(start, end));
            }
        }
        resolved.trim().to_string()
    }

    fn layout(&self, layout: Option<&Layout>) -> String {
        self.anchor(layout.and_then(|l| l.text_anchor.as_ref()))
    }

    fn rows(&self, rows: &[TableRow]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.cells.iter().map(|cell| self.layout(cell.layout.as_ref())).collect())
            .collect()
    }

    fn table(&self, table: &DocumentTable) -> Table {
        Table {
            header_rows: self.rows(&table.header_rows),
            body_rows: self.rows(&table.body_rows),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest<'a> {
    raw_document: RawDocument<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument<'a> {
    content: String,
    mime_type: &'a str,
}

#[derive(Deserialize)]
struct ProcessResponse {
    #[serde(default)]
    document: ProcessedDocument,
}

/// REST client for the `:process` method.
pub struct DocumentAiRestClient {
    url: String,
    access_token: String,
    http: reqwest::blocking::Client,
}

impl DocumentAiRestClient {
    pub fn from_config(config: &DocumentAiConfig) -> Result<Self, InvexError> {
        let endpoint = config.endpoint().ok_or_else(|| {
            InvexError::Config("document_ai.location is not set".to_string())
        })?;
        let processor = config.processor_name().ok_or_else(|| {
            InvexError::Config(format!(
                "document_ai processor for {:?} is not fully configured",
                config.processor
            ))
        })?;
        let access_token = config
            .access_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| InvexError::Config("document_ai.access_token is not set".to_string()))?;

        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| InvexError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: format!("{}/v1/{}:process", endpoint, processor),
            access_token: access_token.to_string(),
            http,
        })
    }

    /// Fully qualified `:process` URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl DocumentAiClient for DocumentAiRestClient {
    fn process(&self, content: &[u8], mime_type: &str) -> Result<ProcessedDocument, BackendError> {
        let body = ProcessRequest {
            raw_document: RawDocument {
                content: STANDARD.encode(content),
                mime_type,
            },
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ProcessResponse =
            serde_json::from_str(&text).map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(parsed.document)
    }
}

/// Sends whole files to a [`DocumentAiClient`].
pub struct DocumentAiAdapter {
    client: Box<dyn DocumentAiClient>,
}

impl DocumentAiAdapter {
    pub fn new(client: Box<dyn DocumentAiClient>) -> Self {
        Self { client }
    }

    pub fn from_config(config: &DocumentAiConfig) -> Result<Self, InvexError> {
        Ok(Self::new(Box::new(DocumentAiRestClient::from_config(config)?)))
    }

    /// Process the file and return one output per page.
    ///
    /// On failure, `page_count` (at least one) failed outputs are returned so
    /// every page still gets a record.
    pub fn process_document(&self, content: &[u8], mime_type: &str, page_count: u32) -> Vec<PageOutput> {
        match self.client.process(content, mime_type) {
            Ok(document) => {
                info!(
                    "Document AI returned {} pages and {} entities",
                    document.pages.len(),
                    document.entities.len()
                );
                for entity in &document.entities {
                    debug!("Entity {} = {:?}", entity.kind, entity.mention_text);
                }
                document.project()
            }
            Err(e) => {
                warn!("Document AI request failed: {}", e);
                let message = e.to_string();
                (1..=page_count.max(1))
                    .map(|page| PageOutput::new(page, RawOutput::failed(message.clone())))
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::ProcessorKind;
    use pretty_assertions::assert_eq;

    const RESPONSE: &str = r#"{
        "document": {
            "text": "ACME Corp\nInvoice 42\nWidget 10.00\nPage two",
            "pages": [
                {
                    "pageNumber": 1,
                    "layout": {"textAnchor": {"textSegments": [{"endIndex": "33"}]}},
                    "tables": [{
                        "headerRows": [{"cells": [
                            {"layout": {"textAnchor": {"textSegments": [{"startIndex": "21", "endIndex": "27"}]}}},
                            {"layout": {"textAnchor": {"textSegments": [{"startIndex": 28, "endIndex": 33}]}}}
                        ]}],
                        "bodyRows": []
                    }]
                },
                {
                    "layout": {"textAnchor": {"textSegments": [{"startIndex": "34", "endIndex": "42"}]}}
                }
            ],
            "entities": [
                {"type": "supplier_name", "mentionText": "ACME Corp"},
                {"type": "invoice_id", "mentionText": "42"},
                {"type": "total_amount"}
            ]
        }
    }"#;

    struct StaticClient(Result<ProcessedDocument, String>);

    impl DocumentAiClient for StaticClient {
        fn process(&self, _content: &[u8], _mime: &str) -> Result<ProcessedDocument, BackendError> {
            self.0.clone().map_err(BackendError::Decode)
        }
    }

    fn sample() -> ProcessedDocument {
        serde_json::from_str::<ProcessResponse>(RESPONSE).unwrap().document
    }

    #[test]
    fn test_response_deserializes() {
        let document = sample();
        assert_eq!(document.pages.len(), 2);
        assert_eq!(document.entities.len(), 3);
        assert_eq!(document.entities[0].kind, "supplier_name");
        assert_eq!(document.entities[2].mention_text, None);

        let segment = &document.pages[0].tables[0].header_rows[0].cells[1]
            .layout
            .as_ref()
            .unwrap()
            .text_anchor
            .as_ref()
            .unwrap()
            .text_segments[0];
        assert_eq!(segment.start_index, Some(28));
        assert_eq!(segment.end_index, Some(33));
    }

    #[test]
    fn test_projection_per_page() {
        let outputs = sample().project();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].page, 1);
        // Second page has no pageNumber and falls back to its position.
        assert_eq!(outputs[1].page, 2);

        match &outputs[0].raw {
            RawOutput::Entities { entities, tables, text } => {
                assert_eq!(entities.len(), 3);
                assert_eq!(text, "ACME Corp\nInvoice 42\nWidget 10.00");
                assert_eq!(tables[0].headers(), ["Widget".to_string(), "10.00".to_string()]);
            }
            other => panic!("expected Entities, got {:?}", other),
        }

        match &outputs[1].raw {
            RawOutput::Entities { entities, tables, text } => {
                // Entities are document-level and repeated on every page.
                assert_eq!(entities.len(), 3);
                assert!(tables.is_empty());
                assert_eq!(text, "Page two");
            }
            other => panic!("expected Entities, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_pages_projects_one_page() {
        let document = ProcessedDocument {
            text: " receipt ".into(),
            ..Default::default()
        };
        let outputs = document.project();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].page, 1);
        assert_eq!(outputs[0].raw.text(), Some("receipt"));
    }

    #[test]
    fn test_anchor_uses_character_offsets() {
        let document = ProcessedDocument {
            text: "Café 12,50 €".into(),
            ..Default::default()
        };
        let anchor = TextAnchor {
            text_segments: vec![
                TextSegment {
                    start_index: None,
                    end_index: Some(4),
                },
                TextSegment {
                    start_index: Some(10),
                    end_index: Some(12),
                },
            ],
        };
        assert_eq!(document.anchor_text(Some(&anchor)), "Café €");
        assert_eq!(document.anchor_text(None), "");
    }

    #[test]
    fn test_anchor_past_end_is_clamped() {
        let text = DocumentText::new("Total 9€");
        assert_eq!(text.slice(6, 50), "9€");
        assert_eq!(text.slice(40, 50), "");
    }

    #[test]
    fn test_service_page_numbers_are_kept() {
        let document: ProcessedDocument = serde_json::from_str(
            r#"{"text": "a b", "pages": [{"pageNumber": 1}, {"pageNumber": 3}]}"#,
        )
        .unwrap();
        let pages: Vec<u32> = document.project().iter().map(|o| o.page).collect();
        assert_eq!(pages, vec![1, 3]);
    }

    #[test]
    fn test_failure_yields_one_output_per_page() {
        let adapter = DocumentAiAdapter::new(Box::new(StaticClient(Err("quota exceeded".into()))));

        let outputs = adapter.process_document(b"%PDF", "application/pdf", 3);
        assert_eq!(outputs.iter().map(|o| o.page).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(outputs.iter().all(|o| matches!(o.raw, RawOutput::Failed { .. })));

        assert_eq!(adapter.process_document(b"", "image/png", 0).len(), 1);
    }

    #[test]
    fn test_success_uses_client_document() {
        let adapter = DocumentAiAdapter::new(Box::new(StaticClient(Ok(sample()))));
        assert_eq!(adapter.process_document(b"%PDF", "application/pdf", 1).len(), 2);
    }

    #[test]
    fn test_rest_client_url() {
        let config = DocumentAiConfig {
            project_id: Some("acme-prod".into()),
            location: Some("eu".into()),
            processor_id_invoice: Some("abc123".into()),
            processor: ProcessorKind::Invoice,
            access_token: Some("token".into()),
            ..Default::default()
        };
        let client = DocumentAiRestClient::from_config(&config).unwrap();
        assert_eq!(
            client.url(),
            "https://eu-documentai.googleapis.com/v1/projects/acme-prod/locations/eu/processors/abc123:process"
        );
    }

    #[test]
    fn test_rest_client_requires_token() {
        let config = DocumentAiConfig {
            project_id: Some("acme-prod".into()),
            location: Some("us".into()),
            processor_id_invoice: Some("abc123".into()),
            ..Default::default()
        };
        assert!(matches!(
            DocumentAiRestClient::from_config(&config),
            Err(InvexError::Config(_))
        ));
    }
}
