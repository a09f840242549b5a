//! Google Drive API client.
//!
//! Thin wrapper over the Drive v3 REST API with the two calls the catalog
//! needs: listing a folder's children and downloading a file's content.
//!
//! ### API
//!
//! - **Endpoint**: `https://www.googleapis.com/drive/v3` (configurable)
//! - **Authentication**: service-account JWT exchanged for a bearer token.
//! - **Rate Limiting**: every call waits for a minimum interval since the previous one.
//! - **Paging**: `files.list` pages are followed until `nextPageToken` is absent.

pub mod auth;
pub mod response;

pub use auth::{ServiceAccountKey, TokenProvider};
pub use response::{DriveFile, FileList};

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use tokio::sync::Mutex;
use vitrine_core::{AppConfig, Error};

use response::FOLDER_MIME_TYPE;

/// Largest page Drive accepts for `files.list`.
const PAGE_SIZE: u32 = 1000;

/// Drive client configuration.
#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// Base64 service-account key; validated on first use.
    pub credentials: Option<String>,
    /// Base URL (default: https://www.googleapis.com/drive/v3).
    pub base_url: String,
    /// Request timeout (default: 20s).
    pub timeout: Duration,
    /// User-agent string (default: vitrine/0.1).
    pub user_agent: String,
    /// Minimum spacing between API calls (default: none).
    pub min_request_interval: Duration,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            base_url: "https://www.googleapis.com/drive/v3".to_string(),
            timeout: Duration::from_millis(20_000),
            user_agent: "vitrine/0.1".to_string(),
            min_request_interval: Duration::ZERO,
        }
    }
}

impl From<&AppConfig> for DriveConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            credentials: config.credentials.clone(),
            base_url: config.drive_base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
            min_request_interval: config.min_request_interval(),
        }
    }
}

/// Rate limiter to enforce request intervals.
#[derive(Debug)]
struct RateLimiter {
    last_request: Mutex<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(Instant::now().checked_sub(min_interval).unwrap_or_else(Instant::now)),
            min_interval,
        }
    }

    /// Acquire permission to make a request, waiting if necessary.
    async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();
        if elapsed < self.min_interval {
            tokio::time::sleep(self.min_interval - elapsed).await;
        }
        *last = Instant::now();
    }
}

/// Map a non-success origin status onto the shared error taxonomy.
pub(crate) fn map_status(status: StatusCode, context: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::OriginAuth(format!("{context}: status {}", status.as_u16())),
        429 => Error::OriginRateLimited(format!("{context}: status 429")),
        code => Error::HttpError(format!("{context}: status {code}")),
    }
}

fn transport_error(err: reqwest::Error, context: &str) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(format!("{context}: {err}"))
    } else {
        Error::HttpError(format!("{context}: network error: {err}"))
    }
}

/// Escape a value for use inside a single-quoted Drive query literal.
fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Drive API client.
#[derive(Debug, Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    config: DriveConfig,
    auth: Arc<TokenProvider>,
    rate_limiter: Arc<RateLimiter>,
}

impl DriveClient {
    /// Create a new Drive client with the given configuration.
    pub fn new(config: DriveConfig) -> Result<Self, Error> {
        url::Url::parse(&config.base_url)
            .map_err(|e| Error::Configuration(format!("invalid Drive base URL {:?}: {e}", config.base_url)))?;

        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        let auth = Arc::new(TokenProvider::new(config.credentials.clone()));
        let rate_limiter = Arc::new(RateLimiter::new(config.min_request_interval));

        Ok(Self { http, config, auth, rate_limiter })
    }

    /// List the non-trashed children of `parent`, following every page.
    ///
    /// With `folders_only`, only sub-folders are returned. Results are ordered by name.
    pub async fn list_children(&self, parent: &str, folders_only: bool) -> Result<Vec<DriveFile>, Error> {
        let mut q = format!("'{}' in parents and trashed = false", quote(parent));
        if folders_only {
            q.push_str(&format!(" and mimeType = '{FOLDER_MIME_TYPE}'"));
        }

        let url = format!("{}/files", self.config.base_url);
        let page_size = PAGE_SIZE.to_string();
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.auth.token(&self.http).await?;
            self.rate_limiter.acquire().await;

            let mut query = vec![
                ("q", q.as_str()),
                ("fields", "nextPageToken, files(id, name, mimeType)"),
                ("pageSize", page_size.as_str()),
                ("orderBy", "name"),
            ];
            if let Some(page) = page_token.as_deref() {
                query.push(("pageToken", page));
            }

            let response = self
                .http
                .get(&url)
                .bearer_auth(&token)
                .query(&query)
                .send()
                .await
                .map_err(|e| transport_error(e, "files.list"))?;

            let status = response.status();
            if !status.is_success() {
                return Err(map_status(status, "files.list"));
            }

            let page: FileList = response
                .json()
                .await
                .map_err(|e| Error::Parse(format!("files.list: {e}")))?;

            files.extend(page.files);
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        tracing::debug!(parent, count = files.len(), "listed folder");
        Ok(files)
    }

    /// Download a file's content as text.
    pub async fn download_text(&self, file_id: &str) -> Result<String, Error> {
        let token = self.auth.token(&self.http).await?;
        self.rate_limiter.acquire().await;

        let url = format!("{}/files/{}", self.config.base_url, file_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(|e| transport_error(e, "files.get"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(map_status(status, "files.get"));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, "files.get"))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = DriveConfig::default();
        assert_eq!(config.base_url, "https://www.googleapis.com/drive/v3");
        assert_eq!(config.timeout, Duration::from_millis(20_000));
        assert!(config.min_request_interval.is_zero());
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_config_from_app_config() {
        let app = AppConfig {
            drive_base_url: "http://127.0.0.1:9000/drive/".into(),
            min_request_interval_ms: 100,
            credentials: Some("abc".into()),
            ..Default::default()
        };
        let config = DriveConfig::from(&app);
        assert_eq!(config.base_url, "http://127.0.0.1:9000/drive");
        assert_eq!(config.min_request_interval, Duration::from_millis(100));
        assert_eq!(config.credentials.as_deref(), Some("abc"));
    }

    #[test]
    fn test_map_status() {
        assert!(matches!(map_status(StatusCode::UNAUTHORIZED, "x"), Error::OriginAuth(_)));
        assert!(matches!(map_status(StatusCode::FORBIDDEN, "x"), Error::OriginAuth(_)));
        assert!(matches!(map_status(StatusCode::TOO_MANY_REQUESTS, "x"), Error::OriginRateLimited(_)));
        assert!(matches!(map_status(StatusCode::BAD_GATEWAY, "x"), Error::HttpError(msg) if msg.contains("502")));
    }

    #[test]
    fn test_quote_escapes_literals() {
        assert_eq!(quote("abc"), "abc");
        assert_eq!(quote("it's"), "it\\'s");
    }

    #[tokio::test]
    async fn test_rate_limiter_spaces_requests() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn test_client_new() {
        let client = DriveClient::new(DriveConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_rejects_bad_base_url() {
        let config = DriveConfig { base_url: "not a url".into(), ..Default::default() };
        assert!(matches!(DriveClient::new(config), Err(Error::Configuration(_))));
    }
}
