//! Freshness policy: when a snapshot is served as-is, refreshed, or flagged stale.

use std::fmt;
use std::time::Duration;

use crate::config::ConfigError;

/// TTL plus the pre-emptive refresh window before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    ttl: Duration,
    refresh_threshold: Duration,
}

/// Where a snapshot's age falls relative to the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// `age < ttl - refresh_threshold`
    Fresh,
    /// `ttl - refresh_threshold <= age < ttl`
    NearingExpiry,
    /// `age >= ttl`
    Expired,
}

impl Window {
    /// Whether a read in this window should kick a background refresh.
    pub fn needs_refresh(self) -> bool {
        !matches!(self, Window::Fresh)
    }
}

/// Tag reported to clients in `X-Cache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Served from a synchronous origin fetch.
    Miss,
    /// Served from a snapshot younger than the TTL.
    Hit,
    /// Served from a snapshot at or past the TTL.
    Stale,
}

impl Freshness {
    pub fn as_str(self) -> &'static str {
        match self {
            Freshness::Miss => "MISS",
            Freshness::Hit => "HIT",
            Freshness::Stale => "STALE",
        }
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CachePolicy {
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` unless `0 < ttl` and `refresh_threshold < ttl`.
    pub fn new(ttl: Duration, refresh_threshold: Duration) -> Result<Self, ConfigError> {
        if ttl.is_zero() {
            return Err(ConfigError::Invalid {
                field: "cache_ttl_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if refresh_threshold >= ttl {
            return Err(ConfigError::Invalid {
                field: "refresh_threshold_secs".into(),
                reason: "must be less than cache_ttl_secs".into(),
            });
        }
        Ok(Self { ttl, refresh_threshold })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn refresh_threshold(&self) -> Duration {
        self.refresh_threshold
    }

    /// Age at which reads start triggering background refreshes.
    pub fn refresh_after(&self) -> Duration {
        self.ttl - self.refresh_threshold
    }

    pub fn classify(&self, age: Duration) -> Window {
        if age >= self.ttl {
            Window::Expired
        } else if age >= self.refresh_after() {
            Window::NearingExpiry
        } else {
            Window::Fresh
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self { ttl: Duration::from_secs(60), refresh_threshold: Duration::from_secs(30) }
    }
}
