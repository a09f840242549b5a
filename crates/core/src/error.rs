//! Unified error types for vitrine.
//!
//! Every variant renders with a stable upper-case code prefix so log lines and
//! the `details` field of error responses can be grepped by failure class.

/// Unified error type shared by the cache core, the origin client and the server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Origin credentials or origin settings are missing or malformed.
    #[error("CONFIG_ERROR: {0}")]
    Configuration(String),

    /// The origin rejected our credentials.
    #[error("ORIGIN_AUTH_ERROR: {0}")]
    OriginAuth(String),

    /// The origin is throttling us.
    #[error("ORIGIN_RATE_LIMITED: {0}")]
    OriginRateLimited(String),

    /// Non-success HTTP status or transport failure talking to the origin.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// The origin did not answer within the client timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// The origin answered with a payload we could not decode.
    #[error("PARSE_ERROR: {0}")]
    Parse(String),

    /// The catalog could not be serialized into a snapshot body.
    #[error("SERIALIZE_ERROR: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    /// Stable code prefix of this error, without the message.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "CONFIG_ERROR",
            Error::OriginAuth(_) => "ORIGIN_AUTH_ERROR",
            Error::OriginRateLimited(_) => "ORIGIN_RATE_LIMITED",
            Error::HttpError(_) => "HTTP_ERROR",
            Error::FetchTimeout(_) => "FETCH_TIMEOUT",
            Error::Parse(_) => "PARSE_ERROR",
            Error::Serialize(_) => "SERIALIZE_ERROR",
        }
    }
}

impl From<crate::config::ConfigError> for Error {
    fn from(err: crate::config::ConfigError) -> Self {
        Error::Configuration(err.to_string())
    }
}
