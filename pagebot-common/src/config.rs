//! Configuration management for the Pagebot relay.
//!
//! The relay reads a YAML file (`config.yaml` by default, or the path in
//! `PAGEBOT_CONFIG`) and then applies environment overrides.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `HOST` → server.host
//! - `PORT` → server.port
//! - `CERT_FILE` / `KEY_FILE` → server.cert_file / server.key_file
//! - `TOKEN` → facebook.verify_token
//! - `LATEST_API_VERSION` → facebook.api_version
//! - `PAGE_ID` → facebook.page_id
//! - `PAGE_ACCESS_TOKEN` → facebook.page_access_token
//! - `APP_SECRET` → facebook.app_secret
//! - `PREDICT_URL` → sentiment.predict_url
//! - `QIANWEN_KEY` → assistant.api_key
//! - `ENVIRONMENT` → observability.environment
//! - `PAGEBOT_LOG_LEVEL` → observability.log_level

use crate::error::{Error, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Environment variable naming an alternate config file.
pub const CONFIG_PATH_ENV: &str = "PAGEBOT_CONFIG";

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.yaml"))
}

// ============================================================================
// Server
// ============================================================================

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// Port 443 switches the listener to TLS.
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub cert_file: Option<String>,

    #[serde(default)]
    pub key_file: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cert_file: None,
            key_file: None,
        }
    }
}

impl ServerConfig {
    /// Whether the listener should terminate TLS itself.
    pub const fn tls_enabled(&self) -> bool {
        self.port == 443
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}

const fn default_port() -> u16 {
    443
}

// ============================================================================
// Facebook
// ============================================================================

/// Messenger platform credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    /// Token echoed back by the platform during webhook verification
    #[serde(default)]
    pub verify_token: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default)]
    pub page_id: String,

    #[serde(default)]
    pub page_access_token: String,

    /// When set, inbound deliveries must carry a valid `X-Hub-Signature-256`
    #[serde(default)]
    pub app_secret: Option<String>,

    #[serde(default = "default_graph_url")]
    pub graph_url: String,

    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

impl Default for FacebookConfig {
    fn default() -> Self {
        Self {
            verify_token: String::new(),
            api_version: default_api_version(),
            page_id: String::new(),
            page_access_token: String::new(),
            app_secret: None,
            graph_url: default_graph_url(),
            send_timeout_secs: default_send_timeout(),
        }
    }
}

fn default_api_version() -> String {
    "v19.0".into()
}

fn default_graph_url() -> String {
    "https://graph.facebook.com".into()
}

const fn default_send_timeout() -> u64 {
    30
}

// ============================================================================
// Sentiment
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentConfig {
    #[serde(default = "default_predict_url")]
    pub predict_url: String,

    #[serde(default = "default_sentiment_timeout")]
    pub timeout_secs: u64,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            predict_url: default_predict_url(),
            timeout_secs: default_sentiment_timeout(),
        }
    }
}

fn default_predict_url() -> String {
    "http://127.0.0.1:5000/predict".into()
}

const fn default_sentiment_timeout() -> u64 {
    30
}

// ============================================================================
// Assistant
// ============================================================================

/// Conversational assistant (DashScope text generation) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_assistant_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_assistant_model")]
    pub model: String,

    #[serde(default = "default_assistant_timeout")]
    pub timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_assistant_endpoint(),
            model: default_assistant_model(),
            timeout_secs: default_assistant_timeout(),
        }
    }
}

fn default_assistant_endpoint() -> String {
    "https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation".into()
}

fn default_assistant_model() -> String {
    "qwen-max".into()
}

const fn default_assistant_timeout() -> u64 {
    120
}

// ============================================================================
// Observability
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// "development" logs to the console; anything else logs to `log_file`
    #[serde(default)]
    pub environment: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub log_format: String,

    #[serde(default = "default_log_file")]
    pub log_file: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            environment: String::new(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            log_file: default_log_file(),
        }
    }
}

impl ObservabilityConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "json".into()
}

fn default_log_file() -> String {
    "log/app.log".into()
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration structure for the relay.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub facebook: FacebookConfig,

    #[serde(default)]
    pub sentiment: SentimentConfig,

    #[serde(default)]
    pub assistant: AssistantConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path with environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&config_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path.
    ///
    /// A missing file yields defaults; anything else unreadable is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .context(format!("Failed to read config from {}", path.display()))?;

        serde_yaml::from_str(&content)
            .context(format!("Failed to parse config from {}", path.display()))
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (the process environment in production).
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Some(cert) = lookup("CERT_FILE") {
            self.server.cert_file = Some(cert);
        }
        if let Some(key) = lookup("KEY_FILE") {
            self.server.key_file = Some(key);
        }

        if let Some(token) = lookup("TOKEN") {
            self.facebook.verify_token = token;
        }
        if let Some(version) = lookup("LATEST_API_VERSION") {
            self.facebook.api_version = version;
        }
        if let Some(page_id) = lookup("PAGE_ID") {
            self.facebook.page_id = page_id;
        }
        if let Some(token) = lookup("PAGE_ACCESS_TOKEN") {
            self.facebook.page_access_token = token;
        }
        if let Some(secret) = lookup("APP_SECRET") {
            self.facebook.app_secret = Some(secret).filter(|s| !s.is_empty());
        }

        if let Some(url) = lookup("PREDICT_URL") {
            self.sentiment.predict_url = url;
        }
        if let Some(key) = lookup("QIANWEN_KEY") {
            self.assistant.api_key = key;
        }

        if let Some(env) = lookup("ENVIRONMENT") {
            self.observability.environment = env;
        }
        if let Some(level) = lookup("PAGEBOT_LOG_LEVEL") {
            self.observability.log_level = level;
        }
    }

    /// Check that everything needed to serve traffic is present.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();

        if self.facebook.verify_token.is_empty() {
            missing.push("facebook.verify_token (TOKEN)");
        }
        if self.facebook.page_id.is_empty() {
            missing.push("facebook.page_id (PAGE_ID)");
        }
        if self.facebook.page_access_token.is_empty() {
            missing.push("facebook.page_access_token (PAGE_ACCESS_TOKEN)");
        }
        if self.assistant.api_key.is_empty() {
            missing.push("assistant.api_key (QIANWEN_KEY)");
        }
        if self.server.tls_enabled() {
            if self.server.cert_file.is_none() {
                missing.push("server.cert_file (CERT_FILE)");
            }
            if self.server.key_file.is_none() {
                missing.push("server.key_file (KEY_FILE)");
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )))
        }
    }

    /// Socket address for the listener; `host` must be an IPv4 or IPv6 literal.
    pub fn bind_address(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.server.host.parse().map_err(|_| {
            Error::Config(format!("server.host is not an IP address: {}", self.server.host))
        })?;
        Ok(SocketAddr::from((ip, self.server.port)))
    }
}
