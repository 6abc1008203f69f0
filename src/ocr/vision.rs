//! Vision-model OCR backend over an OpenAI-compatible chat completions API.
//!
//! Works with hosted OCR models such as Typhoon OCR as well as self-hosted
//! vLLM/Ollama endpoints. The page PNG is sent inline as a base64 data URL.
//! Requires an API key (OCR_API_KEY) for hosted endpoints.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::backend::{OcrBackend, OcrBackendType, OcrConfig, OcrError};
use crate::raster::PageImage;

/// Default endpoint (Typhoon OCR, OpenAI-compatible).
pub const DEFAULT_VISION_ENDPOINT: &str = "https://api.opentyphoon.ai/v1";
/// Default model name.
pub const DEFAULT_VISION_MODEL: &str = "typhoon-ocr-preview";

/// Prompt sent with every page.
pub const VISION_OCR_PROMPT: &str = "Extract all text from this document page. Return only the extracted text in reading order, preserving line breaks and paragraph breaks. Do not add any explanations or commentary.";

/// OCR backend that calls a vision-language model.
pub struct VisionApiBackend {
    config: OcrConfig,
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl VisionApiBackend {
    /// Create a backend against the default endpoint and model.
    pub fn new(config: OcrConfig) -> Result<Self, OcrError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OcrError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
            model: DEFAULT_VISION_MODEL.to_string(),
            api_key: std::env::var("OCR_API_KEY").ok(),
        })
    }

    /// Set the API base URL (without the `/chat/completions` suffix).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        if api_key.is_some() {
            self.api_key = api_key;
        }
        self
    }

    fn build_request(&self, page: &PageImage) -> ChatRequest<'_> {
        let data = base64::engine::general_purpose::STANDARD.encode(&page.png);
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: VISION_OCR_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:image/png;base64,{}", data),
                        },
                    },
                ],
            }],
            max_tokens: 16384,
            temperature: 0.1,
        }
    }
}

#[async_trait]
impl OcrBackend for VisionApiBackend {
    fn backend_type(&self) -> OcrBackendType {
        OcrBackendType::VisionApi
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some() || !self.endpoint.starts_with("https://")
    }

    fn availability_hint(&self) -> String {
        if self.is_available() {
            format!(
                "Vision OCR is available (model: {}, endpoint: {})",
                self.model, self.endpoint
            )
        } else {
            format!("OCR_API_KEY not set for {}", self.endpoint)
        }
    }

    fn model_name(&self) -> Option<String> {
        Some(self.model.clone())
    }

    async fn run_ocr(&self, page: &PageImage) -> Result<String, OcrError> {
        let url = format!("{}/chat/completions", self.endpoint);
        let mut request = self.client.post(&url).json(&self.build_request(page));
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        tracing::debug!("vision ocr: page {} -> {}", page.number, url);

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                OcrError::Timeout(self.config.timeout_secs)
            } else {
                OcrError::Transport(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::OcrFailed(format!(
                "Vision API error ({}): {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| OcrError::MalformedResponse(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = parsed.error {
            return Err(OcrError::OcrFailed(format!(
                "Vision API error: {}",
                error.message
            )));
        }

        parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| OcrError::MalformedResponse("response has no choices".to_string()))
    }
}
