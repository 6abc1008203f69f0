//! Local OCR through the `tesseract` binary.
//!
//! The page PNG is piped to `tesseract stdin stdout`, so no page image is
//! ever written to disk.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::backend::{OcrBackend, OcrBackendType, OcrConfig, OcrError};
use super::model_utils::check_binary;
use crate::raster::PageImage;

const BINARY: &str = "tesseract";

pub struct TesseractBackend {
    config: OcrConfig,
}

impl TesseractBackend {
    pub fn new() -> Self {
        Self::with_config(OcrConfig::default())
    }

    pub fn with_config(config: OcrConfig) -> Self {
        Self { config }
    }

    async fn pipe_page(&self, png: &[u8]) -> Result<std::process::Output, OcrError> {
        let mut child = Command::new(BINARY)
            .args(["stdin", "stdout", "-l", &self.config.language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => OcrError::BackendNotAvailable(format!(
                    "{} not found (install tesseract-ocr)",
                    BINARY
                )),
                _ => OcrError::Io(e),
            })?;

        // Stdin must be closed before tesseract starts reading output.
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(png).await?;
        }

        Ok(child.wait_with_output().await?)
    }
}

impl Default for TesseractBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrBackend for TesseractBackend {
    fn backend_type(&self) -> OcrBackendType {
        OcrBackendType::Tesseract
    }

    fn is_available(&self) -> bool {
        check_binary(BINARY)
    }

    fn availability_hint(&self) -> String {
        if self.is_available() {
            format!("tesseract ready (language: {})", self.config.language)
        } else {
            "Install tesseract with Thai data: apt install tesseract-ocr tesseract-ocr-tha"
                .to_string()
        }
    }

    async fn run_ocr(&self, page: &PageImage) -> Result<String, OcrError> {
        tracing::debug!(page = page.number, bytes = page.png.len(), "tesseract");

        let limit = Duration::from_secs(self.config.timeout_secs);
        let output = tokio::time::timeout(limit, self.pipe_page(&page.png))
            .await
            .map_err(|_| OcrError::Timeout(self.config.timeout_secs))??;

        if !output.status.success() {
            return Err(OcrError::OcrFailed(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type() {
        let backend = TesseractBackend::new();
        assert_eq!(backend.backend_type(), OcrBackendType::Tesseract);
        assert_eq!(backend.model_name(), None);
    }

    #[test]
    fn test_availability_hint_matches_install_state() {
        let backend = TesseractBackend::with_config(OcrConfig {
            language: "eng".to_string(),
            timeout_secs: 5,
        });
        let hint = backend.availability_hint();
        if backend.is_available() {
            assert!(hint.contains("eng"));
        } else {
            assert!(hint.contains("apt install"));
        }
    }

    #[tokio::test]
    async fn test_garbage_input_is_an_error_when_installed() {
        let backend = TesseractBackend::new();
        if !backend.is_available() {
            return;
        }
        let page = PageImage {
            number: 1,
            width_pt: 10.0,
            height_pt: 10.0,
            png: b"not a png".to_vec(),
        };
        assert!(backend.run_ocr(&page).await.is_err());
    }
}
