//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (NEWSFEED_*)
//! 2. TOML config file (if NEWSFEED_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Internal service host names. An override pointing at one of these is only
/// reachable from inside the deployment network.
pub const API_SERVICE_HOST: &str = "core-api-service";
pub const RECOMMEND_SERVICE_HOST: &str = "recommendation-service";

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (NEWSFEED_*)
/// 2. TOML config file (if NEWSFEED_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Explicit base URL of the core API.
    ///
    /// Set via NEWSFEED_API_URL environment variable.
    #[serde(default)]
    pub api_url: Option<String>,

    /// Explicit base URL of the recommendation service.
    ///
    /// Set via NEWSFEED_RECOMMEND_URL environment variable.
    #[serde(default)]
    pub recommend_url: Option<String>,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via NEWSFEED_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via NEWSFEED_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Articles per page for the infinite article feed.
    ///
    /// Set via NEWSFEED_PAGE_SIZE environment variable.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// How long fetched data counts as fresh, in milliseconds.
    ///
    /// Set via NEWSFEED_STALE_TIME_MS environment variable.
    #[serde(default)]
    pub stale_time_ms: u64,

    /// How long unobserved cache entries survive garbage collection, in milliseconds.
    ///
    /// Set via NEWSFEED_GC_TIME_MS environment variable.
    #[serde(default = "default_gc_time_ms")]
    pub gc_time_ms: u64,

    /// Where persisted credentials live.
    ///
    /// Set via NEWSFEED_CREDENTIALS_PATH environment variable.
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_user_agent() -> String {
    "newsfeed/0.1".into()
}

fn default_page_size() -> u32 {
    20
}

fn default_gc_time_ms() -> u64 {
    300_000
}

fn default_credentials_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("newsfeed").join("credentials.json"))
        .unwrap_or_else(|| PathBuf::from("./newsfeed-credentials.json"))
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            recommend_url: None,
            timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
            page_size: default_page_size(),
            stale_time_ms: 0,
            gc_time_ms: default_gc_time_ms(),
            credentials_path: default_credentials_path(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn stale_time(&self) -> Duration {
        Duration::from_millis(self.stale_time_ms)
    }

    pub fn gc_time(&self) -> Duration {
        Duration::from_millis(self.gc_time_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `NEWSFEED_`
    /// 2. TOML file from `NEWSFEED_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("NEWSFEED_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("NEWSFEED_")
                .ignore(&["CONFIG_FILE", "LOCATION", "PASSWORD"])
                .map(|key| key.as_str().to_lowercase().into()),
        );

        Self::from_figment(figment)
    }

    /// Extract and validate a configuration from an already layered figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
