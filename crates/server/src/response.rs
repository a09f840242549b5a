//! Turns a served snapshot into an HTTP response.

use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use vitrine_core::Served;

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
pub const X_CACHE_AGE: HeaderName = HeaderName::from_static("x-cache-age");

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    details: &'a str,
}

/// Builds catalog responses with the caching headers clients rely on.
#[derive(Debug, Clone, Copy)]
pub struct ResponseAssembler {
    ttl: Duration,
}

impl ResponseAssembler {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// 200 carrying the snapshot body.
    pub fn build(&self, served: &Served, cors: HeaderMap) -> Response {
        let mut headers = self.cache_headers(served);
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.extend(cors);
        (StatusCode::OK, headers, Body::from(served.snapshot.body.clone())).into_response()
    }

    /// 304 with the same validators and no body.
    pub fn not_modified(&self, served: &Served, cors: HeaderMap) -> Response {
        let mut headers = self.cache_headers(served);
        headers.extend(cors);
        (StatusCode::NOT_MODIFIED, headers).into_response()
    }

    /// JSON error body; never cached by clients.
    pub fn build_error(details: &str, status: StatusCode) -> Response {
        let body = ErrorBody { error: "Failed to fetch products", details };
        let json = serde_json::to_vec(&body).unwrap_or_default();
        (
            status,
            [
                (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
                (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
            ],
            json,
        )
            .into_response()
    }

    fn cache_headers(&self, served: &Served) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let snapshot = &served.snapshot;
        insert(&mut headers, header::CACHE_CONTROL, format!("public, max-age={}", self.ttl.as_secs()));
        insert(&mut headers, header::ETAG, etag(&snapshot.validator));
        insert(&mut headers, header::LAST_MODIFIED, snapshot.last_modified_http());
        headers.insert(X_CACHE, HeaderValue::from_static(served.freshness.as_str()));
        insert(&mut headers, X_CACHE_AGE, format!("{}ms", served.age.as_millis()));
        headers
    }
}

fn etag(validator: &str) -> String {
    format!("\"{validator}\"")
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: String) {
    match HeaderValue::try_from(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(e) => tracing::warn!(header = %name, error = %e, "dropping unrepresentable header"),
    }
}

/// Whether `If-None-Match` names the current validator (weak or strong) or `*`.
pub fn matches_if_none_match(request: &HeaderMap, validator: &str) -> bool {
    let Some(value) = request.get(header::IF_NONE_MATCH).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let current = etag(validator);
    value.split(',').map(str::trim).any(|tag| tag == "*" || tag.trim_start_matches("W/") == current)
}
