//! Configuration management for the varta harvester
//!
//! Configuration is read from `VARTA_*` environment variables with sensible
//! defaults, so the binary runs out of the box against local registry files.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the provider registry file (TOML or JSON)
    pub providers_file: PathBuf,

    /// Path to the sink registry file (TOML or JSON)
    pub sinks_file: PathBuf,

    /// Delay between harvesting passes
    pub crawl_interval: Duration,

    /// Dedupe store backend ("sqlite", or "none"/"disabled" to turn it off)
    pub storage_type: String,

    /// SQLite database path for the dedupe store
    pub sqlite_path: PathBuf,

    /// How long a published article id stays marked
    pub article_ttl: Duration,

    /// Minimum time between expired-mark cleanup scans
    pub cleanup_interval: Duration,

    /// Per-request timeout for outbound HTTP calls
    pub request_timeout: Duration,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let providers_file = std::env::var("VARTA_PROVIDERS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./configs/providers.toml"));

        let sinks_file = std::env::var("VARTA_SINKS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./configs/sinks.toml"));

        let crawl_interval_secs = std::env::var("VARTA_CRAWL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(900);

        let storage_type =
            std::env::var("VARTA_STORAGE_TYPE").unwrap_or_else(|_| "sqlite".to_string());

        let sqlite_path = std::env::var("VARTA_SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/cache.db"));

        let article_ttl_secs = std::env::var("VARTA_ARTICLE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5 * 24 * 3600);

        let cleanup_interval_secs = std::env::var("VARTA_CLEANUP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(12 * 3600);

        let request_timeout_secs = std::env::var("VARTA_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(15);

        let level = std::env::var("VARTA_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let format = std::env::var("VARTA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

        Ok(Self {
            providers_file,
            sinks_file,
            crawl_interval: Duration::from_secs(crawl_interval_secs.max(1)),
            storage_type,
            sqlite_path,
            article_ttl: Duration::from_secs(article_ttl_secs),
            cleanup_interval: Duration::from_secs(cleanup_interval_secs),
            request_timeout: Duration::from_secs(request_timeout_secs.max(1)),
            logging: LoggingConfig { level, format },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers_file: PathBuf::from("./configs/providers.toml"),
            sinks_file: PathBuf::from("./configs/sinks.toml"),
            crawl_interval: Duration::from_secs(900),
            storage_type: "sqlite".to_string(),
            sqlite_path: PathBuf::from("./data/cache.db"),
            article_ttl: Duration::from_secs(5 * 24 * 3600),
            cleanup_interval: Duration::from_secs(12 * 3600),
            request_timeout: Duration::from_secs(15),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
            },
        }
    }
}
