//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Longest TTL we accept for a catalog snapshot (one day).
const MAX_TTL_SECS: u64 = 24 * 60 * 60;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_ttl_secs` is 0 or exceeds one day
    /// - `refresh_threshold_secs` is not below `cache_ttl_secs`
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `default_price` is negative
    /// - `drive_base_url` is not an http(s) URL
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "cache_ttl_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.cache_ttl_secs > MAX_TTL_SECS {
            return Err(ConfigError::Invalid {
                field: "cache_ttl_secs".into(),
                reason: "must not exceed one day (86400s)".into(),
            });
        }

        if self.refresh_threshold_secs >= self.cache_ttl_secs {
            return Err(ConfigError::Invalid {
                field: "refresh_threshold_secs".into(),
                reason: format!("must be less than cache_ttl_secs ({})", self.cache_ttl_secs),
            });
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

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.default_price < 0 {
            return Err(ConfigError::Invalid { field: "default_price".into(), reason: "must not be negative".into() });
        }

        if !(self.drive_base_url.starts_with("https://") || self.drive_base_url.starts_with("http://")) {
            return Err(ConfigError::Invalid {
                field: "drive_base_url".into(),
                reason: "must be an http(s) URL".into(),
            });
        }

        if self.allowed_origins.is_empty() {
            tracing::warn!("allowed_origins is empty; browsers on other origins will be denied cross-origin access");
        }

        Ok(())
    }
}
