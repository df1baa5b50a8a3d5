// src/error.rs

//! Unified error handling for the scraper.
//!
//! `AppError` is what the application surfaces. The pipeline stages use the
//! narrower families below so each layer can decide what to absorb:
//!
//! - [`GatewayError`]: upstream search API (filters, HTTP status, transport)
//! - [`StoreError`]: persistence of a single tweet
//! - [`CacheError`]: cache backend failures

use std::fmt;

use thiserror::Error;

/// Result type alias for scraper operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// SQLite failure outside a single-record save
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Upstream search API error
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Persistence error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Error kinds reported by the upstream search API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    NotAcceptable,
    RateLimited,
    Unknown,
}

/// HTTP status → error kind. Anything not listed is `Unknown`.
const STATUS_ERRORS: &[(u16, UpstreamErrorKind)] = &[
    (400, UpstreamErrorKind::BadRequest),
    (401, UpstreamErrorKind::Unauthorized),
    (403, UpstreamErrorKind::Forbidden),
    (404, UpstreamErrorKind::NotFound),
    (406, UpstreamErrorKind::NotAcceptable),
    (429, UpstreamErrorKind::RateLimited),
];

impl UpstreamErrorKind {
    /// Map a non-success HTTP status to its error kind.
    pub fn from_status(status: u16) -> Self {
        STATUS_ERRORS
            .iter()
            .find(|(code, _)| *code == status)
            .map(|(_, kind)| *kind)
            .unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for UpstreamErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::BadRequest => "bad request",
            Self::Unauthorized => "authorization failed",
            Self::Forbidden => "access forbidden",
            Self::NotFound => "not found",
            Self::NotAcceptable => "invalid request format",
            Self::RateLimited => "rate limit exceeded",
            Self::Unknown => "unknown upstream error",
        };
        f.write_str(text)
    }
}

/// Errors raised while talking to the search API.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Zero or several search filters were supplied
    #[error("Invalid filters: {0}")]
    InvalidFilters(String),

    /// The configured base URL cannot address the search endpoint
    #[error("Invalid endpoint: {0}")]
    Endpoint(String),

    /// Upstream answered with a non-success status
    #[error("Upstream error {status}: {kind}")]
    Upstream { status: u16, kind: UpstreamErrorKind },

    /// Network-level failure (timeout, connection refused, ...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body was not valid JSON
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Request could not be signed
    #[error("Signing error: {0}")]
    Signing(String),
}

impl GatewayError {
    /// Build the error for a non-success HTTP status.
    pub fn upstream(status: u16) -> Self {
        Self::Upstream {
            status,
            kind: UpstreamErrorKind::from_status(status),
        }
    }

    /// Whether this error is the upstream asking us to back off.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            Self::Upstream {
                kind: UpstreamErrorKind::RateLimited,
                ..
            }
        )
    }

    /// Whether this error is a caller mistake rather than an upstream failure.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidFilters(_) | Self::Endpoint(_))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {err}"))
        } else if err.is_connect() {
            Self::Transport(format!("connection failed: {err}"))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Errors raised while persisting a single tweet.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Unique constraint violated (duplicate tweet, conflicting account)
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// A field failed a model constraint
    #[error("Invalid field: {0}")]
    Invalid(String),

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Create a field validation error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::ConstraintViolation) => Self::Integrity(err.to_string()),
            _ => Self::Database(err.to_string()),
        }
    }
}

/// Cache backend failure.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt cache entry: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),
}
