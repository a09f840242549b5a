//! Cross-origin policy for the catalog endpoint.
//!
//! Only exact matches against the allow-list receive CORS headers. Other
//! origins still get the catalog; the browser enforces the denial.

use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue, header};
use vitrine_core::AppConfig;

#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
    max_age: Duration,
}

impl CorsPolicy {
    pub fn new(allowed_origins: Vec<String>, max_age: Duration) -> Self {
        Self { allowed_origins, max_age }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.allowed_origins.clone(), Duration::from_secs(config.cors_max_age_secs))
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|allowed| allowed == origin)
    }

    /// Headers granting `origin` read access, or an empty map if it is not allowed.
    pub fn resolve_cors_headers(&self, origin: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let Some(origin) = origin.filter(|o| self.is_allowed(o)) else {
            return headers;
        };
        let Ok(origin) = HeaderValue::from_str(origin) else {
            return headers;
        };

        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET"));
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(self.max_age.as_secs()));
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
        headers
    }
}

/// The request's `Origin` header, if present and readable.
pub fn request_origin(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::ORIGIN).and_then(|v| v.to_str().ok())
}
