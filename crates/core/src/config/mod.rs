//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (NETSTASH_*)
//! 2. TOML config file (if NETSTASH_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The loaded [`AppConfig`] is plain data. The engine never reads it directly;
//! it is compiled once into [`crate::engine::EngineSettings`] at startup.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (NETSTASH_*)
/// 2. TOML config file (if NETSTASH_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin that relative URLs (precache manifest, preload lists) resolve against.
    ///
    /// Set via NETSTASH_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Cache version; every partition name is prefixed with it.
    ///
    /// Set via NETSTASH_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Path to SQLite cache database.
    ///
    /// Set via NETSTASH_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for origin requests.
    ///
    /// Set via NETSTASH_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via NETSTASH_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Per-fetch timeout in milliseconds.
    ///
    /// Set via NETSTASH_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Chance that a fresh API hit also triggers a background refresh.
    ///
    /// Set via NETSTASH_REVALIDATE_PROBABILITY environment variable.
    #[serde(default = "default_revalidate_probability")]
    pub revalidate_probability: f64,

    /// Buffered events per broadcast subscriber before it starts lagging.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,

    /// Freshness windows per partition.
    #[serde(default)]
    pub ttl: TtlConfig,

    /// Path rules used by the request classifier.
    #[serde(default)]
    pub routes: RouteConfig,

    /// URLs written into the static partition at install time.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,
}

/// Freshness windows, in milliseconds, for each partition kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlConfig {
    #[serde(default = "default_static_ttl_ms")]
    pub static_ms: u64,
    #[serde(default = "default_api_ttl_ms")]
    pub api_ms: u64,
    #[serde(default = "default_image_ttl_ms")]
    pub image_ms: u64,
    #[serde(default = "default_page_ttl_ms")]
    pub page_ms: u64,
}

/// Path rules for request classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Path prefixes that mark an API request.
    #[serde(default = "default_api_prefixes")]
    pub api_prefixes: Vec<String>,

    /// Regular expressions (unanchored) that mark an API request.
    #[serde(default = "default_api_patterns")]
    pub api_patterns: Vec<String>,

    /// Path prefix of server-rendered pages.
    #[serde(default = "default_page_prefix")]
    pub page_prefix: String,

    /// Path prefix of versioned static assets.
    #[serde(default = "default_static_prefix")]
    pub static_prefix: String,
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_version() -> String {
    "v1".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./netstash-cache.sqlite")
}

fn default_user_agent() -> String {
    "netstash/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_revalidate_probability() -> f64 {
    0.1
}

fn default_broadcast_capacity() -> usize {
    64
}

fn default_static_ttl_ms() -> u64 {
    24 * 60 * 60 * 1000
}

fn default_api_ttl_ms() -> u64 {
    5 * 60 * 1000
}

fn default_image_ttl_ms() -> u64 {
    7 * 24 * 60 * 60 * 1000
}

fn default_page_ttl_ms() -> u64 {
    60 * 60 * 1000
}

fn default_api_prefixes() -> Vec<String> {
    vec!["/api/".into()]
}

fn default_api_patterns() -> Vec<String> {
    vec![r"/api/posts".into(), r"/api/categories".into(), r"/api/health".into()]
}

fn default_page_prefix() -> String {
    "/blog".into()
}

fn default_static_prefix() -> String {
    "/static/".into()
}

fn default_precache() -> Vec<String> {
    vec![
        "/".into(),
        "/blog".into(),
        "/static/css/main.css".into(),
        "/static/js/main.js".into(),
        "/manifest.json".into(),
    ]
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            static_ms: default_static_ttl_ms(),
            api_ms: default_api_ttl_ms(),
            image_ms: default_image_ttl_ms(),
            page_ms: default_page_ttl_ms(),
        }
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            api_prefixes: default_api_prefixes(),
            api_patterns: default_api_patterns(),
            page_prefix: default_page_prefix(),
            static_prefix: default_static_prefix(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            version: default_version(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            revalidate_probability: default_revalidate_probability(),
            broadcast_capacity: default_broadcast_capacity(),
            ttl: TtlConfig::default(),
            routes: RouteConfig::default(),
            precache: default_precache(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `NETSTASH_`
    /// 2. TOML file from `NETSTASH_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment()
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("NETSTASH_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("NETSTASH_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }
}
