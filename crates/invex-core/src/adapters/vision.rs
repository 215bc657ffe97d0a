//! Vision-language model adapter.
//!
//! Each page image is JPEG encoded, inlined as a base64 data URL and sent to
//! a chat-completions style endpoint together with [`EXTRACTION_PROMPT`].
//! The reply is expected to be a JSON object but nothing guarantees it.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::PageAdapter;
use crate::error::{BackendError, InvexError};
use crate::models::config::VisionConfig;
use crate::models::raw::RawOutput;
use crate::preprocess::PageUnit;

/// Instruction sent with every page image.
pub const EXTRACTION_PROMPT: &str = "\
Extract the invoice data shown in this image and reply with a single JSON object \
and nothing else. Use exactly these keys:
{
  \"date\": \"invoice date as printed\",
  \"total_amount\": \"final total as printed, without the currency\",
  \"costs\": [{\"description\": \"line item text\", \"amount\": \"line item amount\"}],
  \"vendor_name\": \"name of the issuing company\",
  \"invoice_number\": \"invoice number or id\",
  \"currency\": \"currency code or symbol\"
}
Use null for any field that is not visible. Use an empty list when there are no line items.";

/// One completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionRequest {
    pub model: String,
    pub prompt: String,
    /// `data:image/jpeg;base64,...`
    pub image_data_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Multimodal model endpoint.
pub trait VisionModel {
    /// Send one request and return the completion text.
    fn complete(&self, request: &VisionRequest) -> Result<String, BackendError>;
}

/// Chat-completions request body.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
    detail: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client.
pub struct OpenAiVisionClient {
    api_key: String,
    base_url: String,
    http: reqwest::blocking::Client,
}

impl OpenAiVisionClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, InvexError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InvexError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &VisionConfig) -> Result<Self, InvexError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| InvexError::Config("vision.api_key is not set".to_string()))?;

        Self::new(
            api_key,
            config.base_url.as_str(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

impl VisionModel for OpenAiVisionClient {
    fn complete(&self, request: &VisionRequest) -> Result<String, BackendError> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: &request.prompt,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: &request.image_data_url,
                            detail: "high",
                        },
                    },
                ],
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
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

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| BackendError::Decode(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| BackendError::Decode("no completion content in response".to_string()))
    }
}

/// Sends each page image to a [`VisionModel`] and parses the reply.
pub struct VisionAdapter {
    model: Box<dyn VisionModel>,
    model_id: String,
    max_tokens: u32,
    jpeg_quality: u8,
}

impl VisionAdapter {
    pub fn new(model: Box<dyn VisionModel>, config: &VisionConfig) -> Self {
        Self {
            model,
            model_id: config.model.clone(),
            max_tokens: config.max_tokens,
            jpeg_quality: config.jpeg_quality,
        }
    }

    pub fn from_config(config: &VisionConfig) -> Result<Self, InvexError> {
        let client = OpenAiVisionClient::from_config(config)?;
        Ok(Self::new(Box::new(client), config))
    }

    fn request_for(&self, image: &DynamicImage) -> Result<VisionRequest, BackendError> {
        Ok(VisionRequest {
            model: self.model_id.clone(),
            prompt: EXTRACTION_PROMPT.to_string(),
            image_data_url: jpeg_data_url(image, self.jpeg_quality)?,
            max_tokens: self.max_tokens,
            temperature: 0.0,
        })
    }
}

impl PageAdapter for VisionAdapter {
    fn name(&self) -> &'static str {
        "vision_llm"
    }

    fn process(&self, unit: &PageUnit) -> RawOutput {
        let (page, image) = match unit {
            PageUnit::RasterImage { page, image } => (*page, image),
            PageUnit::DigitalText { page, .. } => {
                warn!("Page {} reached the vision adapter without an image", page);
                return RawOutput::failed("vision model requires a page image");
            }
        };

        let result = self
            .request_for(image)
            .and_then(|request| self.model.complete(&request));

        match result {
            Ok(reply) => {
                let output = parse_response(&reply);
                if matches!(output, RawOutput::Unparsed { .. }) {
                    warn!("Page {}: model reply is not a JSON object", page);
                } else {
                    debug!("Page {}: parsed model reply", page);
                }
                output
            }
            Err(e) => {
                warn!("Vision request failed on page {}: {}", page, e);
                RawOutput::failed(e.to_string())
            }
        }
    }
}

/// Encode `image` as an RGB JPEG and wrap it in a data URL.
pub fn jpeg_data_url(image: &DynamicImage, quality: u8) -> Result<String, BackendError> {
    let rgb = image.to_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(&rgb)
        .map_err(|e| BackendError::Encode(e.to_string()))?;

    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(&buffer)))
}

/// Interpret a model reply: a JSON object becomes [`RawOutput::Json`],
/// anything else is kept verbatim as [`RawOutput::Unparsed`].
pub fn parse_response(reply: &str) -> RawOutput {
    let reply = reply.trim();
    match serde_json::from_str::<Value>(strip_code_fence(reply)) {
        Ok(Value::Object(map)) => RawOutput::Json(map),
        _ => RawOutput::Unparsed {
            text: reply.to_string(),
        },
    }
}

/// Remove a surrounding markdown code fence, with or without a language tag.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
