//! The cached catalog snapshot.

use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

use super::hash::compute_validator;
use crate::{Error, Product};

/// IMF-fixdate, the preferred HTTP date format (RFC 9110 §5.6.7).
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// One complete, internally consistent copy of the catalog.
///
/// Snapshots are immutable once built; the store swaps whole snapshots, so
/// `body`, `validator`, `last_modified` and `fetched_at` always belong together.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    /// Serialized JSON array of products.
    pub body: Bytes,
    /// Hex SHA-256 of `body`, served as the ETag.
    pub validator: String,
    /// Wall-clock time of the refresh that produced this snapshot.
    pub last_modified: DateTime<Utc>,
    /// Monotonic completion instant of that refresh, used for age.
    pub fetched_at: Instant,
    pub product_count: usize,
}

impl CacheSnapshot {
    /// Build a snapshot from a freshly fetched catalog.
    ///
    /// `previous` is the snapshot being replaced, if any; `last_modified` never
    /// moves backwards relative to it even if the wall clock does.
    pub fn from_products(products: &[Product], previous: Option<&CacheSnapshot>) -> Result<Self, Error> {
        let body = Bytes::from(serde_json::to_vec(products)?);
        let validator = compute_validator(&body);

        let now = Utc::now();
        let last_modified = match previous {
            Some(prev) if prev.last_modified > now => prev.last_modified,
            _ => now,
        };

        Ok(Self { body, validator, last_modified, fetched_at: Instant::now(), product_count: products.len() })
    }

    /// Time elapsed since this snapshot was fetched, as seen at `now`.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.fetched_at)
    }

    /// `last_modified` formatted for the `Last-Modified` header.
    pub fn last_modified_http(&self) -> String {
        self.last_modified.format(HTTP_DATE_FORMAT).to_string()
    }
}
