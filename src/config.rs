//! Configuration management for pageocr using the prefer crate.
//!
//! `Config` is the file form: every field optional, discovered with
//! `prefer::load("pageocr")` or given with `--config`. It is applied onto
//! `Settings`, the resolved runtime values, and environment variables are
//! applied last.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ocr::OcrBackendType;
use crate::text::SpellRule;

/// Default bind address for the HTTP server.
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

/// Job records expire a day after their last write.
pub const DEFAULT_JOB_TTL_SECS: u64 = 24 * 60 * 60;

/// Cancellation flags expire after ten minutes.
pub const DEFAULT_CANCEL_TTL_SECS: u64 = 600;

/// Progress channel poll period.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Upload size limit (50 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Origins always allowed by CORS (local frontends).
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost:5173", "http://localhost:9000"];

/// OCR backend settings.
#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub backend: OcrBackendType,
    /// Tesseract language string.
    pub language: String,
    /// Base URL of the vision API.
    pub endpoint: Option<String>,
    /// Vision model name.
    pub model: Option<String>,
    pub api_key: Option<String>,
    /// Per-page timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            backend: OcrBackendType::Tesseract,
            language: "tha+eng".to_string(),
            endpoint: None,
            model: None,
            api_key: None,
            timeout_secs: 120,
        }
    }
}

/// Spelling correction settings.
#[derive(Debug, Clone, Default)]
pub struct SpellcheckSettings {
    /// External spellcheck service; None uses the built-in rules.
    pub endpoint: Option<String>,
    /// Extra rewrite rules applied after the defaults.
    pub rules: Vec<SpellRule>,
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// HTTP bind address.
    pub bind: String,
    /// Redis URL for the job store and queue (None = in-process memory).
    pub redis_url: Option<String>,
    /// Workers hosted by `serve`.
    pub workers: usize,
    pub job_ttl_secs: u64,
    pub cancel_ttl_secs: u64,
    pub poll_interval_ms: u64,
    pub max_upload_bytes: usize,
    /// Extra CORS origins on top of [`DEFAULT_ALLOWED_ORIGINS`].
    pub allowed_origins: Vec<String>,
    pub ocr: OcrSettings,
    pub spellcheck: SpellcheckSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            redis_url: None,
            workers: 2,
            job_ttl_secs: DEFAULT_JOB_TTL_SECS,
            cancel_ttl_secs: DEFAULT_CANCEL_TTL_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_origins: Vec::new(),
            ocr: OcrSettings::default(),
            spellcheck: SpellcheckSettings::default(),
        }
    }
}

impl Settings {
    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }

    pub fn cancel_ttl(&self) -> Duration {
        Duration::from_secs(self.cancel_ttl_secs)
    }

    /// Never zero: a zero period would stall every progress poller.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Configured origins plus the local defaults, deduplicated.
    pub fn cors_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = DEFAULT_ALLOWED_ORIGINS
            .iter()
            .map(|s| s.to_string())
            .collect();
        for origin in &self.allowed_origins {
            if !origins.contains(origin) {
                origins.push(origin.clone());
            }
        }
        origins
    }

    /// Apply environment overrides. Environment takes precedence over the file.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| var(name).filter(|s| !s.trim().is_empty());

        if let Some(url) = var("REDIS_URL") {
            tracing::debug!("Using REDIS_URL from environment");
            self.redis_url = Some(url);
        }
        if let Some(origins) = var("ALLOWED_ORIGINS") {
            self.allowed_origins = split_origins(&origins);
        }
        if let Some(key) = var("OCR_API_KEY") {
            self.ocr.api_key = Some(key);
        }
        if let Some(bind) = var("PAGEOCR_BIND") {
            self.bind = bind;
        }
    }
}

/// Split a comma-separated origin list, dropping blanks.
pub fn split_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// OCR section of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrFileConfig {
    /// "tesseract" or "vision".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Spellcheck section of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpellcheckFileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<SpellRule>,
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_ttl_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_ttl_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_upload_bytes: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub ocr: OcrFileConfig,
    #[serde(default)]
    pub spellcheck: SpellcheckFileConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Falls back to defaults when no pageocr config file exists.
    pub async fn load() -> Self {
        match prefer::load("pageocr").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("Ignoring config {}: {}", path.display(), e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// The format follows the file extension (TOML, YAML, otherwise JSON).
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(&contents, ext)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(contents: &str, ext: &str) -> Result<Self, String> {
        match ext {
            "toml" => {
                toml::from_str(contents).map_err(|e| format!("Failed to parse TOML config: {}", e))
            }
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e)),
            _ => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref bind) = self.bind {
            settings.bind = bind.clone();
        }
        if let Some(ref url) = self.redis_url {
            settings.redis_url = Some(url.clone());
        }
        if let Some(workers) = self.workers {
            settings.workers = workers;
        }
        if let Some(ttl) = self.job_ttl_secs {
            settings.job_ttl_secs = ttl;
        }
        if let Some(ttl) = self.cancel_ttl_secs {
            settings.cancel_ttl_secs = ttl;
        }
        if let Some(ms) = self.poll_interval_ms {
            if ms == 0 {
                tracing::warn!("poll_interval_ms must be positive, using 1");
            }
            settings.poll_interval_ms = ms.max(1);
        }
        if let Some(limit) = self.max_upload_bytes {
            settings.max_upload_bytes = limit;
        }
        if !self.allowed_origins.is_empty() {
            settings.allowed_origins = self.allowed_origins.clone();
        }

        if let Some(ref backend) = self.ocr.backend {
            match OcrBackendType::from_str(backend) {
                Some(backend) => settings.ocr.backend = backend,
                None => tracing::warn!("Unknown OCR backend '{}', keeping default", backend),
            }
        }
        if let Some(ref language) = self.ocr.language {
            settings.ocr.language = language.clone();
        }
        if let Some(ref endpoint) = self.ocr.endpoint {
            settings.ocr.endpoint = Some(endpoint.clone());
        }
        if let Some(ref model) = self.ocr.model {
            settings.ocr.model = Some(model.clone());
        }
        if let Some(ref key) = self.ocr.api_key {
            // Allows `api_key = "$TYPHOON_KEY"` in the file.
            let expanded = shellexpand::env(key)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| key.clone());
            settings.ocr.api_key = Some(expanded);
        }
        if let Some(timeout) = self.ocr.timeout_secs {
            settings.ocr.timeout_secs = timeout;
        }

        if let Some(ref endpoint) = self.spellcheck.endpoint {
            settings.spellcheck.endpoint = Some(endpoint.clone());
        }
        settings
            .spellcheck
            .rules
            .extend(self.spellcheck.rules.iter().cloned());
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
}

/// Load settings: config file, then environment.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = match options.config_path {
        Some(ref path) => {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            match Config::load_from_path(Path::new(&expanded)).await {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("{}; using defaults", e);
                    Config::default()
                }
            }
        }
        None => Config::load().await,
    };

    if let Some(ref path) = config.source_path {
        tracing::debug!("Loaded config from {}", path.display());
    }

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings);
    settings.apply_env(|name| std::env::var(name).ok());

    (settings, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.cancel_ttl(), Duration::from_secs(600));
        assert_eq!(settings.poll_interval(), Duration::from_millis(500));
        assert_eq!(settings.job_ttl_secs, 86_400);
        assert!(settings.redis_url.is_none());
        assert_eq!(settings.ocr.backend, OcrBackendType::Tesseract);
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let config = Config::parse(r#"{"poll_interval_ms": 0}"#, "json").unwrap();
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings);
        assert_eq!(settings.poll_interval_ms, 1);
        assert_eq!(settings.poll_interval(), Duration::from_millis(1));

        let direct = Settings {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(!direct.poll_interval().is_zero());
    }

    #[test]
    fn test_parse_toml_and_apply() {
        let config = Config::parse(
            r#"
bind = "127.0.0.1:9100"
redis_url = "redis://localhost:6379"
workers = 4
allowed_origins = ["https://wiki.example.org"]

[ocr]
backend = "vision"
model = "typhoon-ocr"
timeout_secs = 30

[[spellcheck.rules]]
pattern = "กรงเทพ"
replacement = "กรุงเทพ"
"#,
            "toml",
        )
        .unwrap();

        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings);

        assert_eq!(settings.bind, "127.0.0.1:9100");
        assert_eq!(settings.redis_url.as_deref(), Some("redis://localhost:6379"));
        assert_eq!(settings.workers, 4);
        assert_eq!(settings.ocr.backend, OcrBackendType::VisionApi);
        assert_eq!(settings.ocr.model.as_deref(), Some("typhoon-ocr"));
        assert_eq!(settings.ocr.timeout_secs, 30);
        assert_eq!(settings.spellcheck.rules.len(), 1);
        assert!(settings
            .cors_origins()
            .contains(&"https://wiki.example.org".to_string()));
    }

    #[test]
    fn test_parse_yaml() {
        let config = Config::parse("workers: 3\nocr:\n  language: eng\n", "yaml").unwrap();
        assert_eq!(config.workers, Some(3));
        assert_eq!(config.ocr.language.as_deref(), Some("eng"));
    }

    #[test]
    fn test_parse_invalid_json_reports_format() {
        let err = Config::parse("{ not json", "json").unwrap_err();
        assert!(err.contains("JSON"));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut settings = Settings::default();
        Config {
            redis_url: Some("redis://file:6379".to_string()),
            ..Default::default()
        }
        .apply_to_settings(&mut settings);

        let env: HashMap<&str, &str> = [
            ("REDIS_URL", "redis://env:6379"),
            ("ALLOWED_ORIGINS", "https://a.example, ,https://b.example"),
            ("OCR_API_KEY", "secret"),
            ("PAGEOCR_BIND", ""),
        ]
        .into_iter()
        .collect();
        settings.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(settings.redis_url.as_deref(), Some("redis://env:6379"));
        assert_eq!(
            settings.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(settings.ocr.api_key.as_deref(), Some("secret"));
        // Blank values are ignored.
        assert_eq!(settings.bind, DEFAULT_BIND);
    }

    #[test]
    fn test_cors_origins_include_local_defaults_once() {
        let settings = Settings {
            allowed_origins: vec!["http://localhost:5173".to_string()],
            ..Default::default()
        };
        let origins = settings.cors_origins();
        assert_eq!(origins.len(), 2);
    }

    #[tokio::test]
    async fn test_load_from_path_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pageocr.json");
        tokio::fs::write(&path, r#"{"poll_interval_ms": 250}"#)
            .await
            .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.poll_interval_ms, Some(250));
        assert_eq!(config.source_path.as_deref(), Some(path.as_path()));
    }
}
