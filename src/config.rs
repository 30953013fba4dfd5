//! Configuration module for novyny.

use serde::Deserialize;
use std::path::Path;

use crate::{NovynyError, Result};

/// Web server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Snapshot cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Store backend: "redis", "file" or "memory".
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Redis connection URL (redis backend only).
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Maximum value size in bytes accepted by the shared store
    /// (redis backend only; 0 disables the ceiling).
    #[serde(default = "default_max_value_size")]
    pub max_value_size: usize,
    /// Directory holding the per-key files (file backend only).
    #[serde(default = "default_cache_dir")]
    pub dir: String,
    /// Maximum number of items kept in the snapshot.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Refresh lock TTL in seconds; also the hard ceiling on one
    /// refresh cycle's duration.
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,
}

fn default_backend() -> String {
    "file".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_max_value_size() -> usize {
    1024 * 1024
}

fn default_cache_dir() -> String {
    "data/cache".to_string()
}

fn default_max_items() -> usize {
    50
}

fn default_lock_ttl() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            redis_url: default_redis_url(),
            max_value_size: default_max_value_size(),
            dir: default_cache_dir(),
            max_items: default_max_items(),
            lock_ttl_secs: default_lock_ttl(),
        }
    }
}

/// Headline feed configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Top-headlines endpoint URL.
    #[serde(default = "default_feed_url")]
    pub url: String,
    /// API key for the feed service.
    #[serde(default)]
    pub api_key: String,
    /// Country filter.
    #[serde(default = "default_country")]
    pub country: String,
    /// Category filter.
    #[serde(default = "default_category")]
    pub category: String,
    /// Language filter.
    #[serde(default = "default_lang")]
    pub lang: String,
    /// Minimum seconds between upstream fetches.
    #[serde(default = "default_feed_interval")]
    pub interval_secs: u64,
}

fn default_feed_url() -> String {
    "https://gnews.io/api/v4/top-headlines".to_string()
}

fn default_country() -> String {
    "ua".to_string()
}

fn default_category() -> String {
    "general".to_string()
}

fn default_lang() -> String {
    "uk".to_string()
}

fn default_feed_interval() -> u64 {
    900
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            api_key: String::new(),
            country: default_country(),
            category: default_category(),
            lang: default_lang(),
            interval_secs: default_feed_interval(),
        }
    }
}

/// Full-text extraction service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractorConfig {
    /// Extraction endpoint URL.
    #[serde(default = "default_extractor_url")]
    pub url: String,
    /// API keys, rotated across requests.
    #[serde(default)]
    pub api_keys: Vec<String>,
    /// Maximum concurrent extraction requests per refresh cycle.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-request timeout in seconds.
    #[serde(default = "default_extractor_timeout")]
    pub timeout_secs: u64,
}

fn default_extractor_url() -> String {
    "https://extractorapi.com/api/v1/extractor".to_string()
}

fn default_concurrency() -> usize {
    1
}

fn default_extractor_timeout() -> u64 {
    30
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            url: default_extractor_url(),
            api_keys: Vec::new(),
            concurrency: default_concurrency(),
            timeout_secs: default_extractor_timeout(),
        }
    }
}

/// Content policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Topic keywords that disqualify an item (matched case-insensitively
    /// against title and description).
    #[serde(default = "default_denylist")]
    pub denylist: Vec<String>,
}

fn default_denylist() -> Vec<String> {
    [
        "астролог",
        "гороскоп",
        "зодіак",
        "езотерик",
        "езотерич",
        "hamster kombat",
        "хамстер",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            denylist: default_denylist(),
        }
    }
}

/// Display configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Timezone for rendered publication times (e.g., "Europe/Kyiv").
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Site title used in the rendered snapshot.
    #[serde(default = "default_site_title")]
    pub site_title: String,
}

fn default_timezone() -> String {
    "Europe/Kyiv".to_string()
}

fn default_site_title() -> String {
    "Новини".to_string()
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            site_title: default_site_title(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file (empty disables file logging).
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/novyny.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Web server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Feed settings.
    #[serde(default)]
    pub feed: FeedConfig,
    /// Extractor settings.
    #[serde(default)]
    pub extractor: ExtractorConfig,
    /// Content policy settings.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Display settings.
    #[serde(default)]
    pub display: DisplayConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(NovynyError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| NovynyError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `NOVYNY_FEED_API_KEY`: Override the feed API key
    /// - `NOVYNY_EXTRACTOR_API_KEYS`: Comma-separated extractor API keys
    /// - `NOVYNY_REDIS_URL`: Override the redis connection URL
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("NOVYNY_FEED_API_KEY") {
            if !key.is_empty() {
                self.feed.api_key = key;
            }
        }
        if let Ok(keys) = std::env::var("NOVYNY_EXTRACTOR_API_KEYS") {
            if !keys.is_empty() {
                self.extractor.api_keys = keys
                    .split(',')
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect();
            }
        }
        if let Ok(url) = std::env::var("NOVYNY_REDIS_URL") {
            if !url.is_empty() {
                self.cache.redis_url = url;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - The cache backend is not one of "redis", "file" or "memory"
    /// - The feed API key is not set
    /// - No extractor API key is set
    /// - The extractor concurrency is zero
    pub fn validate(&self) -> Result<()> {
        match self.cache.backend.as_str() {
            "redis" | "file" | "memory" => {}
            other => {
                return Err(NovynyError::Config(format!(
                    "unknown cache backend: {other}"
                )));
            }
        }
        if self.feed.api_key.is_empty() {
            return Err(NovynyError::Config(
                "feed.api_key is not set (or NOVYNY_FEED_API_KEY)".to_string(),
            ));
        }
        if self.extractor.api_keys.is_empty() {
            return Err(NovynyError::Config(
                "extractor.api_keys is empty (or NOVYNY_EXTRACTOR_API_KEYS)".to_string(),
            ));
        }
        if self.extractor.concurrency == 0 {
            return Err(NovynyError::Config(
                "extractor.concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
