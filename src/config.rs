//! Configuration management for guidance-session.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::{AssetResolver, HttpStepService};
use crate::cli::Args;
use crate::prefetch::{AssetPrefetcher, DEFAULT_PLACEHOLDER};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Step service connection.
    pub api: ApiSection,
    /// Option media prefetching.
    pub prefetch: PrefetchSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Step service configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    /// Root URL of the step service API.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_string(),
            token: None,
            request_timeout_secs: 30,
        }
    }
}

/// Prefetch configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchSection {
    /// Global timeout for one step's option media, in milliseconds.
    pub timeout_ms: u64,
    /// Reference used for options that could not be resolved.
    pub placeholder_url: String,
}

impl Default for PrefetchSection {
    fn default() -> Self {
        Self {
            timeout_ms: 25_000,
            placeholder_url: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or a full filter directive.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("GUIDANCE_API_URL") {
            self.api.base_url = url;
        }

        if let Some(token) = lookup("GUIDANCE_API_TOKEN") {
            if !token.is_empty() {
                self.api.token = Some(token);
            }
        }

        if let Some(timeout) = lookup("GUIDANCE_PREFETCH_TIMEOUT_MS") {
            if let Ok(timeout) = timeout.parse() {
                self.prefetch.timeout_ms = timeout;
            }
        }

        if let Some(level) = lookup("GUIDANCE_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = lookup("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref url) = args.api_url {
            self.api.base_url = url.clone();
        }

        if let Some(ref token) = args.token {
            self.api.token = Some(token.clone());
        }

        if let Some(timeout) = args.prefetch_timeout_ms {
            self.prefetch.timeout_ms = timeout;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env();
        config.apply_args(args);
        config.validate()?;

        Ok(config)
    }

    /// Check values that cannot be fixed up silently.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api.base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.api.base_url.clone()));
        }
        if self.api.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("api.request_timeout_secs", "0".into()));
        }
        if self.prefetch.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue("prefetch.timeout_ms", "0".into()));
        }
        if self.prefetch.placeholder_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "prefetch.placeholder_url",
                self.prefetch.placeholder_url.clone(),
            ));
        }
        Ok(())
    }

    /// Per-request timeout of the step service client.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }

    /// Global prefetch timeout.
    pub fn prefetch_timeout(&self) -> Duration {
        Duration::from_millis(self.prefetch.timeout_ms)
    }

    /// Build the HTTP step service.
    pub fn to_http_service(&self) -> crate::Result<HttpStepService> {
        HttpStepService::new(
            self.api.base_url.clone(),
            self.api.token.clone(),
            self.request_timeout(),
        )
    }

    /// Build a prefetcher over `resolver` with the configured timeout and placeholder.
    pub fn build_prefetcher(&self, resolver: Arc<dyn AssetResolver>) -> AssetPrefetcher {
        AssetPrefetcher::new(resolver)
            .with_timeout(self.prefetch_timeout())
            .with_placeholder(self.prefetch.placeholder_url.clone())
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// API URL without an http(s) scheme.
    InvalidUrl(String),
    /// Out-of-range setting.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidUrl(url) => write!(f, "invalid API URL: {}", url),
            Self::InvalidValue(name, value) => write!(f, "invalid value for {}: '{}'", name, value),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://127.0.0.1:8000/api");
        assert!(config.api.token.is_none());
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.prefetch_timeout(), Duration::from_secs(25));
        assert_eq!(config.prefetch.placeholder_url, DEFAULT_PLACEHOLDER);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "api": {
                "base_url": "https://guidance.example.org/api",
                "token": "abc",
                "request_timeout_secs": 10
            },
            "prefetch": {
                "timeout_ms": 5000,
                "placeholder_url": "/img/none.png"
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.api.base_url, "https://guidance.example.org/api");
        assert_eq!(config.api.token.as_deref(), Some("abc"));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.prefetch_timeout(), Duration::from_millis(5000));
        assert_eq!(config.prefetch.placeholder_url, "/img/none.png");
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{
            "prefetch": {
                "timeout_ms": 1000
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.api.base_url, "http://127.0.0.1:8000/api"); // Default
        assert_eq!(config.prefetch.timeout_ms, 1000);
        assert_eq!(config.prefetch.placeholder_url, DEFAULT_PLACEHOLDER);
    }

    #[test]
    fn test_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_apply_env() {
        let vars: HashMap<&str, &str> = [
            ("GUIDANCE_API_URL", "https://env.example.org/api"),
            ("GUIDANCE_API_TOKEN", "env-token"),
            ("GUIDANCE_PREFETCH_TIMEOUT_MS", "750"),
            ("RUST_LOG", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_with(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.api.base_url, "https://env.example.org/api");
        assert_eq!(config.api.token.as_deref(), Some("env-token"));
        assert_eq!(config.prefetch.timeout_ms, 750);
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_env_log_level_beats_rust_log() {
        let mut config = Config::default();
        config.apply_env_with(|key| match key {
            "GUIDANCE_LOG_LEVEL" => Some("warn".into()),
            "RUST_LOG" => Some("trace".into()),
            _ => None,
        });
        assert_eq!(config.log_filter(), "warn");
    }

    #[test]
    fn test_env_ignores_unparsable_timeout() {
        let mut config = Config::default();
        config.apply_env_with(|key| (key == "GUIDANCE_PREFETCH_TIMEOUT_MS").then(|| "soon".into()));
        assert_eq!(config.prefetch.timeout_ms, 25_000);
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        let args = Args {
            api_url: Some("http://10.0.0.5:8000/api".to_string()),
            token: Some("cli-token".to_string()),
            prefetch_timeout_ms: Some(2000),
            log_level: Some("trace".to_string()),
            ..Args::default()
        };

        config.apply_args(&args);

        assert_eq!(config.api.base_url, "http://10.0.0.5:8000/api");
        assert_eq!(config.api.token.as_deref(), Some("cli-token"));
        assert_eq!(config.prefetch.timeout_ms, 2000);
        assert_eq!(config.log_filter(), "trace");
    }

    #[test]
    fn test_args_leave_unset_values() {
        let mut config = Config::default();
        config.api.token = Some("file-token".into());

        config.apply_args(&Args::default());
        assert_eq!(config.api.token.as_deref(), Some("file-token"));
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.api.base_url = "localhost:8000".to_string();

        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.prefetch.timeout_ms = 0;

        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "invalid value for prefetch.timeout_ms: '0'");
    }

    #[test]
    fn test_blank_placeholder_rejected() {
        let mut config = Config::default();
        config.prefetch.placeholder_url = "  ".into();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue("prefetch.placeholder_url", _))
        ));
    }

    #[test]
    fn test_build_prefetcher() {
        let mut config = Config::default();
        config.prefetch.timeout_ms = 1500;
        config.prefetch.placeholder_url = "/none.png".into();

        let resolver = Arc::new(crate::api::ScriptedAssetResolver::new());
        let prefetcher = config.build_prefetcher(resolver);
        assert_eq!(prefetcher.timeout(), Duration::from_millis(1500));
        assert_eq!(prefetcher.placeholder(), "/none.png");
    }

    #[test]
    fn test_to_http_service() {
        let config = Config::default();
        let service = config.to_http_service().unwrap();
        assert_eq!(service.base_url(), "http://127.0.0.1:8000/api");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"base_url\""));
        assert!(json.contains("\"timeout_ms\""));
    }
}
