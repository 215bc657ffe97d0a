//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::InvexError;

/// Main configuration for the invex pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvexConfig {
    /// Backend used to extract fields.
    pub strategy: Strategy,

    /// PDF processing configuration.
    pub pdf: PdfConfig,

    /// Local OCR configuration.
    pub ocr: OcrConfig,

    /// Vision-language model configuration.
    pub vision: VisionConfig,

    /// Managed document-AI configuration.
    pub document_ai: DocumentAiConfig,

    /// Normalization configuration.
    pub extraction: ExtractionConfig,
}

/// Extraction backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// OCR engine running locally.
    #[default]
    LocalOcr,
    /// Multimodal model prompted for JSON.
    VisionLlm,
    /// Remote document-AI processor.
    DocumentAi,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::LocalOcr => "local_ocr",
            Strategy::VisionLlm => "vision_llm",
            Strategy::DocumentAi => "document_ai",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Strategy {
    type Err = InvexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "local_ocr" | "ocr" => Ok(Strategy::LocalOcr),
            "vision_llm" | "vision" | "llm" => Ok(Strategy::VisionLlm),
            "document_ai" | "docai" => Ok(Strategy::DocumentAi),
            other => Err(InvexError::Config(format!("unknown strategy: {}", other))),
        }
    }
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// DPI for rendering PDF pages to images.
    pub render_dpi: u32,

    /// How scanned pages are turned into images.
    pub rasterizer: RasterizerKind,

    /// Path to the poppler `pdftoppm` binary.
    pub pdftoppm_path: PathBuf,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            render_dpi: 200,
            rasterizer: RasterizerKind::Pdftoppm,
            pdftoppm_path: PathBuf::from("pdftoppm"),
        }
    }
}

/// Page rasterization method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RasterizerKind {
    /// Render pages with poppler.
    #[default]
    Pdftoppm,
    /// Pull the embedded scan image of each page.
    Embedded,
}

/// Local OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// Keep `[UNK]` tokens in recognized text instead of blanking them.
    pub keep_unk: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
            keep_unk: false,
        }
    }
}

impl OcrConfig {
    pub fn detection_path(&self) -> PathBuf {
        self.model_dir.join(&self.detection_model)
    }

    pub fn recognition_path(&self) -> PathBuf {
        self.model_dir.join(&self.recognition_model)
    }

    pub fn dictionary_path(&self) -> PathBuf {
        self.model_dir.join(&self.dictionary)
    }
}

/// Vision-language model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// API key for the chat-completions endpoint.
    pub api_key: Option<String>,

    /// Base URL of the API.
    pub base_url: String,

    /// Model identifier.
    pub model: String,

    /// Maximum output tokens per page.
    pub max_tokens: u32,

    /// JPEG quality for page images sent to the model.
    pub jpeg_quality: u8,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            max_tokens: 2000,
            jpeg_quality: 95,
            timeout_secs: 120,
        }
    }
}

/// Managed document-AI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentAiConfig {
    /// Cloud project id.
    pub project_id: Option<String>,

    /// Processor location, e.g. `us` or `eu`.
    pub location: Option<String>,

    /// Processor used for [`ProcessorKind::General`].
    pub processor_id_general: Option<String>,

    /// Processor used for [`ProcessorKind::Invoice`].
    pub processor_id_invoice: Option<String>,

    /// Processor used for [`ProcessorKind::Expense`].
    pub processor_id_expense: Option<String>,

    /// Which processor to call.
    pub processor: ProcessorKind,

    /// OAuth access token sent as a bearer token.
    pub access_token: Option<String>,

    /// Override for the API host, `https://{location}-documentai.googleapis.com` by default.
    pub endpoint: Option<String>,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for DocumentAiConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            location: None,
            processor_id_general: None,
            processor_id_invoice: None,
            processor_id_expense: None,
            processor: ProcessorKind::Invoice,
            access_token: None,
            endpoint: None,
            timeout_secs: 120,
        }
    }
}

impl DocumentAiConfig {
    /// Processor id for the configured capability.
    pub fn processor_id(&self) -> Option<&str> {
        match self.processor {
            ProcessorKind::General => self.processor_id_general.as_deref(),
            ProcessorKind::Invoice => self.processor_id_invoice.as_deref(),
            ProcessorKind::Expense => self.processor_id_expense.as_deref(),
        }
        .filter(|s| !s.trim().is_empty())
    }

    /// Full processor resource name, if every part is configured.
    pub fn processor_name(&self) -> Option<String> {
        let project = non_empty(&self.project_id)?;
        let location = non_empty(&self.location)?;
        let processor = self.processor_id()?;
        Some(format!(
            "projects/{}/locations/{}/processors/{}",
            project, location, processor
        ))
    }

    /// API host for the configured location.
    pub fn endpoint(&self) -> Option<String> {
        if let Some(endpoint) = non_empty(&self.endpoint) {
            return Some(endpoint.trim_end_matches('/').to_string());
        }
        non_empty(&self.location).map(|l| format!("https://{}-documentai.googleapis.com", l))
    }
}

/// Document-AI processor capability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorKind {
    /// General form parser.
    General,
    /// Invoice parser.
    #[default]
    Invoice,
    /// Expense/receipt parser.
    Expense,
}

/// Normalization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Run regex date/amount detection when no entities were mapped.
    pub regex_fallback: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            regex_fallback: true,
        }
    }
}

impl InvexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Overlay credentials and processor ids from environment variables.
    ///
    /// Values already present in the file take precedence.
    pub fn apply_env(mut self) -> Self {
        fill_from_env(&mut self.vision.api_key, "OPENAI_API_KEY");
        fill_from_env(&mut self.document_ai.project_id, "GOOGLE_CLOUD_PROJECT_ID");
        fill_from_env(&mut self.document_ai.location, "DOCUMENT_AI_LOCATION");
        fill_from_env(
            &mut self.document_ai.processor_id_general,
            "DOCUMENT_AI_PROCESSOR_ID_GENERAL",
        );
        fill_from_env(
            &mut self.document_ai.processor_id_invoice,
            "DOCUMENT_AI_PROCESSOR_ID_INVOICE",
        );
        fill_from_env(
            &mut self.document_ai.processor_id_expense,
            "DOCUMENT_AI_PROCESSOR_ID_EXPENSE",
        );
        fill_from_env(&mut self.document_ai.access_token, "DOCUMENT_AI_ACCESS_TOKEN");
        self
    }

    /// Check that the selected strategy has everything it needs.
    pub fn validate(&self) -> Result<(), InvexError> {
        if self.pdf.render_dpi == 0 {
            return Err(InvexError::Config("pdf.render_dpi must be positive".into()));
        }

        match self.strategy {
            Strategy::LocalOcr => {
                for path in [
                    self.ocr.detection_path(),
                    self.ocr.recognition_path(),
                    self.ocr.dictionary_path(),
                ] {
                    if !path.exists() {
                        return Err(InvexError::Config(format!(
                            "OCR model file not found: {}",
                            path.display()
                        )));
                    }
                }
            }
            Strategy::VisionLlm => {
                if non_empty(&self.vision.api_key).is_none() {
                    return Err(InvexError::Config(
                        "vision.api_key is not set (or OPENAI_API_KEY)".into(),
                    ));
                }
                if self.vision.model.trim().is_empty() {
                    return Err(InvexError::Config("vision.model is empty".into()));
                }
                if self.vision.jpeg_quality == 0 || self.vision.jpeg_quality > 100 {
                    return Err(InvexError::Config(
                        "vision.jpeg_quality must be within 1..=100".into(),
                    ));
                }
            }
            Strategy::DocumentAi => {
                let doc_ai = &self.document_ai;
                if non_empty(&doc_ai.project_id).is_none() {
                    return Err(InvexError::Config(
                        "document_ai.project_id is not set (or GOOGLE_CLOUD_PROJECT_ID)".into(),
                    ));
                }
                if non_empty(&doc_ai.location).is_none() {
                    return Err(InvexError::Config(
                        "document_ai.location is not set (or DOCUMENT_AI_LOCATION)".into(),
                    ));
                }
                if doc_ai.processor_id().is_none() {
                    return Err(InvexError::Config(format!(
                        "no processor id configured for {:?} processor",
                        doc_ai.processor
                    )));
                }
                if non_empty(&doc_ai.access_token).is_none() {
                    return Err(InvexError::Config(
                        "document_ai.access_token is not set (or DOCUMENT_AI_ACCESS_TOKEN)".into(),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn fill_from_env(slot: &mut Option<String>, var: &str) {
    if non_empty(slot).is_none() {
        if let Ok(value) = std::env::var(var) {
            if !value.trim().is_empty() {
                *slot = Some(value);
            }
        }
    }
}
