//! OCR backend abstraction.
//!
//! A backend receives one rendered page and returns its text. Backends are
//! pure boundary calls: no retries, no caching, no batching across pages.
//! Whatever retry policy exists belongs to the caller.

use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;

use super::model_utils::build_ocr_result;
use crate::raster::PageImage;

/// Errors from OCR backends.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("OCR request timed out after {0}s")]
    Timeout(u64),

    #[error("Malformed OCR response: {0}")]
    MalformedResponse(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of OCR processing.
#[derive(Debug, Clone)]
pub struct OcrResult {
    /// Extracted text content; may be empty.
    pub text: String,
    /// Which backend produced this result.
    pub backend: OcrBackendType,
    /// Which model was used, for API backends.
    pub model: Option<String>,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Available OCR backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OcrBackendType {
    /// Tesseract OCR via command-line.
    Tesseract,
    /// Vision-language model behind an OpenAI-compatible API.
    VisionApi,
}

impl OcrBackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OcrBackendType::Tesseract => "tesseract",
            OcrBackendType::VisionApi => "vision",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tesseract" => Some(OcrBackendType::Tesseract),
            "vision" | "api" | "typhoon" => Some(OcrBackendType::VisionApi),
            _ => None,
        }
    }
}

impl std::fmt::Display for OcrBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trait for OCR backends.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Get the backend type.
    fn backend_type(&self) -> OcrBackendType;

    /// Check if this backend is available (binaries installed, credentials present).
    fn is_available(&self) -> bool;

    /// Get a description of what's needed to make this backend available.
    fn availability_hint(&self) -> String;

    /// Core OCR: extract text from one rendered page.
    async fn run_ocr(&self, page: &PageImage) -> Result<String, OcrError>;

    /// Model name for this backend, if applicable.
    fn model_name(&self) -> Option<String> {
        None
    }

    /// Run OCR on a page, returning a timed result.
    async fn recognize(&self, page: &PageImage) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let text = self.run_ocr(page).await?;
        Ok(build_ocr_result(
            text,
            self.backend_type(),
            self.model_name(),
            start,
        ))
    }
}

/// Configuration shared by OCR backends.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Language for OCR (e.g., "eng", "tha+eng").
    pub language: String,
    /// Per-page timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "tha+eng".to_string(),
            timeout_secs: 120,
        }
    }
}
