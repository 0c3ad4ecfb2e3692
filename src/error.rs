//! Error types for fanout
//!
//! Two layers of errors exist:
//! - [`Error`] covers everything that can stop a request before or after aggregation
//!   (bad caller input, configuration, I/O while writing output, server startup).
//! - [`FetchError`] describes why a single target failed. It never escapes the batch;
//!   it ends up as data inside the aggregated output.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for fanout operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fanout
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "fetch.default_timeout")
        key: Option<String>,
    },

    /// Caller input could not be turned into a batch of targets.
    ///
    /// The message is shown verbatim to the caller.
    #[error("{0}")]
    InvalidRequest(String),

    /// Output mode other than `json` or `delimiter`
    #[error("invalid response type '{0}': must be one of json, delimiter")]
    UnknownOutputMode(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction failed
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a config key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Why a single fetch unit produced a failure record
///
/// The `Display` text is what ends up in the `error` field of the aggregated output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The target URL could not be parsed
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The URL as supplied by the caller
        url: String,
        /// Parser message
        reason: String,
    },

    /// A programmatic header had an invalid name or value
    #[error("invalid header '{name}': {reason}")]
    InvalidHeader {
        /// Header name as supplied
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// The unit's timeout expired before the call (or its body) completed
    #[error("timeout exceeded after {}ms: connection terminated", .after.as_millis())]
    Timeout {
        /// The timeout that was in effect
        after: Duration,
    },

    /// DNS, connect, TLS, reset or any other transport failure
    #[error("{0}")]
    Transport(String),

    /// Headers arrived but reading the body failed
    #[error("failed to read response body: {0}")]
    Body(String),

    /// The task driving this unit did not finish normally
    #[error("fetch aborted: {0}")]
    Aborted(String),
}

impl FetchError {
    /// Returns true if this failure was caused by the unit's timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }

    /// Classify a reqwest error, folding its own timeout flag into [`FetchError::Timeout`]
    pub(crate) fn from_reqwest(error: &reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            FetchError::Timeout { after: timeout }
        } else if error.is_body() || error.is_decode() {
            FetchError::Body(error.to_string())
        } else {
            FetchError::Transport(error.to_string())
        }
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - caller input
            Error::InvalidRequest(_) => 400,
            Error::UnknownOutputMode(_) => 400,

            // 500 Internal Server Error
            Error::Config { .. } => 500,
            Error::Io(_) => 500,
            Error::Network(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidRequest(_) => "bad_request",
            Error::UnknownOutputMode(_) => "unknown_output_mode",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}
