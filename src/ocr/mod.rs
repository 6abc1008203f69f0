//! OCR engine adapters.
//!
//! One rendered page in, text out. Two backends are available:
//! - **Tesseract**: local `tesseract` binary, CPU-based (default)
//! - **Vision**: a vision-language OCR model behind an OpenAI-compatible API
//!
//! Use [`build_backend`] to construct the backend selected in settings.

mod backend;
mod model_utils;
mod tesseract;
mod vision;

use std::sync::Arc;

pub use backend::{OcrBackend, OcrBackendType, OcrConfig, OcrError, OcrResult};
pub use model_utils::check_binary;
pub use tesseract::TesseractBackend;
pub use vision::{VisionApiBackend, DEFAULT_VISION_ENDPOINT, DEFAULT_VISION_MODEL};

use crate::config::OcrSettings;

/// Construct the configured OCR backend.
///
/// An unavailable backend is still returned (with a warning) so that the
/// failure surfaces per job instead of at startup.
pub fn build_backend(settings: &OcrSettings) -> Result<Arc<dyn OcrBackend>, OcrError> {
    let config = OcrConfig {
        language: settings.language.clone(),
        timeout_secs: settings.timeout_secs,
    };

    let backend: Arc<dyn OcrBackend> = match settings.backend {
        OcrBackendType::Tesseract => Arc::new(TesseractBackend::with_config(config)),
        OcrBackendType::VisionApi => {
            let mut vision = VisionApiBackend::new(config)?.with_api_key(settings.api_key.clone());
            if let Some(ref endpoint) = settings.endpoint {
                vision = vision.with_endpoint(endpoint.clone());
            }
            if let Some(ref model) = settings.model {
                vision = vision.with_model(model.clone());
            }
            Arc::new(vision)
        }
    };

    if !backend.is_available() {
        tracing::warn!("{}", backend.availability_hint());
    }

    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_backend_follows_settings() {
        let settings = OcrSettings {
            backend: OcrBackendType::VisionApi,
            model: Some("typhoon-ocr".to_string()),
            endpoint: Some("http://127.0.0.1:8080/v1/".to_string()),
            ..Default::default()
        };
        let backend = build_backend(&settings).unwrap();
        assert_eq!(backend.backend_type(), OcrBackendType::VisionApi);
        assert_eq!(backend.model_name().as_deref(), Some("typhoon-ocr"));
        // Plain-http endpoints are treated as self-hosted and need no key.
        assert!(backend.is_available());

        let backend = build_backend(&OcrSettings::default()).unwrap();
        assert_eq!(backend.backend_type(), OcrBackendType::Tesseract);
    }
}
