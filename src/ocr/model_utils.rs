//! Shared utilities for OCR backends.

use std::time::Instant;

use super::backend::{OcrBackendType, OcrResult};

/// Check if a binary is available in PATH.
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Assemble an [`OcrResult`] with the elapsed time since `start`.
pub fn build_ocr_result(
    text: String,
    backend: OcrBackendType,
    model: Option<String>,
    start: Instant,
) -> OcrResult {
    OcrResult {
        text,
        backend,
        model,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_binary_missing() {
        assert!(!check_binary("definitely-not-a-real-binary-9f2c"));
    }

    #[test]
    fn test_build_ocr_result_keeps_fields() {
        let result = build_ocr_result(
            "hello".to_string(),
            OcrBackendType::VisionApi,
            Some("typhoon-ocr".to_string()),
            Instant::now(),
        );
        assert_eq!(result.text, "hello");
        assert_eq!(result.backend, OcrBackendType::VisionApi);
        assert_eq!(result.model.as_deref(), Some("typhoon-ocr"));
    }
}
