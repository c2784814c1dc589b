//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - `version` is empty or contains whitespace
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `revalidate_probability` is outside `[0, 1]`
    /// - `broadcast_capacity` is 0
    /// - `user_agent` is empty
    /// - an entry of `routes.api_patterns` is not a valid regex
    pub fn validate(&self) -> Result<(), ConfigError> {
        match url::Url::parse(&self.origin) {
            Ok(origin) if matches!(origin.scheme(), "http" | "https") => {}
            Ok(origin) => {
                return Err(ConfigError::Invalid {
                    field: "origin".into(),
                    reason: format!("unsupported scheme: {}", origin.scheme()),
                });
            }
            Err(e) => return Err(ConfigError::Invalid { field: "origin".into(), reason: e.to_string() }),
        }

        if self.version.is_empty() || self.version.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: "version".into(),
                reason: "must be non-empty and contain no whitespace".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if !(0.0..=1.0).contains(&self.revalidate_probability) {
            return Err(ConfigError::Invalid {
                field: "revalidate_probability".into(),
                reason: "must be between 0 and 1".into(),
            });
        }

        if self.broadcast_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "broadcast_capacity".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        for pattern in &self.routes.api_patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(ConfigError::Invalid { field: "routes.api_patterns".into(), reason: e.to_string() });
            }
        }

        if self.precache.is_empty() {
            tracing::warn!("precache manifest is empty; install will not warm the static partition");
        }

        Ok(())
    }
}
