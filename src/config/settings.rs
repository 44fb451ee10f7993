use serde::Deserialize;
use tokio::time::Duration;

use crate::cache::token_manager::{TokenCacheSettings, TOKEN_EXPIRY};
use crate::resilience::retry::BackoffPolicy;
use crate::utils::constants::{
    DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_HTTP_TIMEOUT_MS, DEFAULT_REFRESH_BUFFER_MINUTES,
};

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct SettingsConfig {
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub token_cache: TokenCacheConfig,
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            metrics: MetricsConfig::default(),
            server: ServerConfig::default(),
            logging: None,
            token_cache: TokenCacheConfig::default(),
            http_timeout_ms: default_http_timeout_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default)]
    pub is_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            path: default_metrics_path(),
            is_enabled: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: String
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: "9100".to_string(),
        }
    }
}

/// ================================
/// Token cache
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct TokenCacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// tokens are dropped this many minutes before their 60 minute expiry
    /// invariant: < 60
    #[serde(default = "default_refresh_buffer_minutes")]
    pub refresh_buffer_minutes: u64,
    /// period of the expired-token sweep in serve mode
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

impl Default for TokenCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_buffer_minutes: DEFAULT_REFRESH_BUFFER_MINUTES,
            cleanup_interval_seconds: DEFAULT_CLEANUP_INTERVAL_SECS,
        }
    }
}

impl TokenCacheConfig {
    pub fn to_settings(&self) -> TokenCacheSettings {
        TokenCacheSettings {
            enabled: self.enabled,
            token_expiry: TOKEN_EXPIRY,
            refresh_buffer: Duration::from_secs(self.refresh_buffer_minutes * 60),
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds.max(1))
    }
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new (level: String, format: LogFormat) -> Self {
        Self { level: level, format: format }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_true() -> bool {
    true
}

fn default_refresh_buffer_minutes() -> u64 {
    DEFAULT_REFRESH_BUFFER_MINUTES
}

fn default_cleanup_interval_seconds() -> u64 {
    DEFAULT_CLEANUP_INTERVAL_SECS
}

fn default_http_timeout_ms() -> u64 {
    DEFAULT_HTTP_TIMEOUT_MS
}
