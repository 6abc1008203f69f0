//! Spelling correction for OCR output.
//!
//! Two checkers:
//! - [`RuleBasedCorrector`]: ordered regex rewrites for known OCR misreads
//! - [`HttpSpellChecker`]: delegates to an external service (`{"text"}` in and out)

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Any Thai character followed by `.ศ` is a misread of the Buddhist-era
/// abbreviation พ.ศ.
static BUDDHIST_ERA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ก-๙]\.ศ").unwrap());

/// Errors from spelling correction.
#[derive(Debug, Error)]
pub enum SpellCheckError {
    #[error("Invalid spellcheck rule '{pattern}': {message}")]
    InvalidRule { pattern: String, message: String },

    #[error("Spellcheck transport error: {0}")]
    Transport(String),

    #[error("Spellcheck service error: {0}")]
    Service(String),

    #[error("Malformed spellcheck response: {0}")]
    MalformedResponse(String),
}

/// A configured regex rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellRule {
    pub pattern: String,
    /// Replacement; may reference capture groups (`$1`).
    pub replacement: String,
}

/// Corrects the spelling of OCR output.
#[async_trait]
pub trait SpellChecker: Send + Sync {
    fn name(&self) -> &'static str;

    async fn correct(&self, text: &str) -> Result<String, SpellCheckError>;
}

/// Applies regex rules in order; the built-in Buddhist-era rule runs first.
#[derive(Debug, Clone)]
pub struct RuleBasedCorrector {
    rules: Vec<(Regex, String)>,
}

impl RuleBasedCorrector {
    pub fn new() -> Self {
        Self {
            rules: vec![(BUDDHIST_ERA.clone(), "พ.ศ".to_string())],
        }
    }

    /// Default rules followed by `extra`.
    pub fn with_rules(extra: &[SpellRule]) -> Result<Self, SpellCheckError> {
        let mut corrector = Self::new();
        for rule in extra {
            let regex = Regex::new(&rule.pattern).map_err(|e| SpellCheckError::InvalidRule {
                pattern: rule.pattern.clone(),
                message: e.to_string(),
            })?;
            corrector.rules.push((regex, rule.replacement.clone()));
        }
        Ok(corrector)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (regex, replacement) in &self.rules {
            out = regex.replace_all(&out, replacement.as_str()).into_owned();
        }
        out
    }
}

impl Default for RuleBasedCorrector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpellChecker for RuleBasedCorrector {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn correct(&self, text: &str) -> Result<String, SpellCheckError> {
        Ok(self.apply(text))
    }
}

#[derive(Serialize)]
struct SpellRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct SpellResponse {
    text: String,
}

/// External spellcheck service.
pub struct HttpSpellChecker {
    client: Client,
    endpoint: String,
}

impl HttpSpellChecker {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SpellCheckError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SpellCheckError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl SpellChecker for HttpSpellChecker {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn correct(&self, text: &str) -> Result<String, SpellCheckError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SpellRequest { text })
            .send()
            .await
            .map_err(|e| SpellCheckError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpellCheckError::Service(format!("{}: {}", status, body)));
        }

        let parsed: SpellResponse = response
            .json()
            .await
            .map_err(|e| SpellCheckError::MalformedResponse(e.to_string()))?;
        Ok(parsed.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};

    #[test]
    fn test_buddhist_era_misread_is_corrected() {
        let corrector = RuleBasedCorrector::new();
        assert_eq!(corrector.apply("ปี ว.ศ. 2567"), "ปี พ.ศ. 2567");
        assert_eq!(corrector.apply("ค.ศ 2024 และ ภ.ศ 2567"), "พ.ศ 2024 และ พ.ศ 2567");
    }

    #[test]
    fn test_latin_text_is_untouched() {
        let corrector = RuleBasedCorrector::new();
        assert_eq!(corrector.apply("A.ศ and p.s."), "A.ศ and p.s.");
    }

    #[test]
    fn test_extra_rules_apply_after_defaults() {
        let corrector = RuleBasedCorrector::with_rules(&[SpellRule {
            pattern: r"(\d+)\s*บาท".to_string(),
            replacement: "$1 บาท".to_string(),
        }])
        .unwrap();
        assert_eq!(corrector.rule_count(), 2);
        assert_eq!(corrector.apply("ข.ศ 100บาท"), "พ.ศ 100 บาท");
    }

    #[test]
    fn test_invalid_rule_is_rejected() {
        let err = RuleBasedCorrector::with_rules(&[SpellRule {
            pattern: "(".to_string(),
            replacement: String::new(),
        }])
        .unwrap_err();
        assert!(matches!(err, SpellCheckError::InvalidRule { .. }));
    }

    #[tokio::test]
    async fn test_http_checker_round_trip() {
        let router = Router::new().route(
            "/check",
            post(|Json(body): Json<serde_json::Value>| async move {
                let text = body["text"].as_str().unwrap_or_default().to_uppercase();
                Json(serde_json::json!({ "text": text }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let checker =
            HttpSpellChecker::new(format!("http://{}/check", addr), Duration::from_secs(5))
                .unwrap();
        assert_eq!(checker.correct("hello").await.unwrap(), "HELLO");
    }

    #[tokio::test]
    async fn test_http_checker_unreachable_is_transport_error() {
        let checker =
            HttpSpellChecker::new("http://127.0.0.1:9/check", Duration::from_secs(2)).unwrap();
        let err = checker.correct("hello").await.unwrap_err();
        assert!(matches!(err, SpellCheckError::Transport(_)));
    }
}
