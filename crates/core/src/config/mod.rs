//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (VITRINE_*)
//! 2. TOML config file (if VITRINE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::net::SocketAddr;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::cache::CachePolicy;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (VITRINE_*)
/// 2. TOML config file (if VITRINE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    ///
    /// Set via VITRINE_BIND_ADDR environment variable.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Seconds a catalog snapshot is considered usable.
    ///
    /// Set via VITRINE_CACHE_TTL_SECS environment variable.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Seconds before expiry at which a background refresh is started.
    ///
    /// Set via VITRINE_REFRESH_THRESHOLD_SECS environment variable.
    #[serde(default = "default_refresh_threshold_secs")]
    pub refresh_threshold_secs: u64,

    /// Browser origins granted cross-origin access to the catalog.
    ///
    /// Set via VITRINE_ALLOWED_ORIGINS environment variable (comma-separated).
    #[serde(default, deserialize_with = "list_or_csv")]
    pub allowed_origins: Vec<String>,

    /// Value of `Access-Control-Max-Age` for allowed origins.
    ///
    /// Set via VITRINE_CORS_MAX_AGE_SECS environment variable.
    #[serde(default = "default_cors_max_age_secs")]
    pub cors_max_age_secs: u64,

    /// Base64-encoded service-account JSON for the origin document store.
    ///
    /// Set via VITRINE_CREDENTIALS environment variable.
    /// Required only when the catalog is first fetched.
    #[serde(default)]
    pub credentials: Option<String>,

    /// Id of the folder whose sub-folders are the products.
    ///
    /// Set via VITRINE_ROOT_FOLDER_ID environment variable.
    #[serde(default)]
    pub root_folder_id: Option<String>,

    /// Base URL of the document store API.
    ///
    /// Set via VITRINE_DRIVE_BASE_URL environment variable.
    #[serde(default = "default_drive_base_url")]
    pub drive_base_url: String,

    /// User-Agent string for origin requests.
    ///
    /// Set via VITRINE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Origin request timeout in milliseconds.
    ///
    /// Set via VITRINE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Minimum spacing between origin API calls, in milliseconds.
    ///
    /// Set via VITRINE_MIN_REQUEST_INTERVAL_MS environment variable.
    #[serde(default)]
    pub min_request_interval_ms: u64,

    /// Price used when a product has no readable price.
    ///
    /// Set via VITRINE_DEFAULT_PRICE environment variable.
    #[serde(default = "default_price")]
    pub default_price: i64,

    /// Description used when a product's description file has a title only.
    ///
    /// Set via VITRINE_DEFAULT_DESCRIPTION environment variable.
    #[serde(default = "default_description")]
    pub default_description: String,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_refresh_threshold_secs() -> u64 {
    30
}

fn default_cors_max_age_secs() -> u64 {
    86_400 // 24h
}

fn default_drive_base_url() -> String {
    "https://www.googleapis.com/drive/v3".into()
}

fn default_user_agent() -> String {
    "vitrine/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_price() -> i64 {
    99
}

fn default_description() -> String {
    "Handmade resin jewelry".into()
}

/// Accept either a real list or a single comma-separated string.
fn list_or_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrCsv {
        List(Vec<String>),
        Csv(String),
    }

    let items = match ListOrCsv::deserialize(deserializer)? {
        ListOrCsv::List(items) => items,
        ListOrCsv::Csv(csv) => csv.split(',').map(str::to_string).collect(),
    };

    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cache_ttl_secs: default_cache_ttl_secs(),
            refresh_threshold_secs: default_refresh_threshold_secs(),
            allowed_origins: Vec::new(),
            cors_max_age_secs: default_cors_max_age_secs(),
            credentials: None,
            root_folder_id: None,
            drive_base_url: default_drive_base_url(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            min_request_interval_ms: 0,
            default_price: default_price(),
            default_description: default_description(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Spacing enforced between origin API calls.
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    /// Freshness policy described by `cache_ttl_secs` and `refresh_threshold_secs`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the threshold is not below the TTL.
    pub fn cache_policy(&self) -> Result<CachePolicy, ConfigError> {
        CachePolicy::new(
            Duration::from_secs(self.cache_ttl_secs),
            Duration::from_secs(self.refresh_threshold_secs),
        )
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `VITRINE_`
    /// 2. TOML file from `VITRINE_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("VITRINE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("VITRINE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Origin credentials, checked when the catalog is first fetched.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the credentials are not set.
    pub fn require_credentials(&self) -> Result<&str, ConfigError> {
        self.credentials
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "credentials".into(),
                hint: "Set VITRINE_CREDENTIALS to the base64-encoded service-account JSON".into(),
            })
    }

    /// Root folder of the catalog, checked when the catalog is first fetched.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the folder id is not set.
    pub fn require_root_folder_id(&self) -> Result<&str, ConfigError> {
        self.root_folder_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "root_folder_id".into(),
                hint: "Set VITRINE_ROOT_FOLDER_ID environment variable".into(),
            })
    }
}
