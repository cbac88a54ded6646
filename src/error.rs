//! Transport-level error types.
//!
//! An [`Error`] is what the default [`Client`](crate::Client) reports when a
//! request produced no usable JSON body. It travels inside
//! [`HttpOutcome::Failure`](crate::HttpOutcome::Failure) and is never
//! surfaced to callers of [`Recipients`](crate::Recipients) directly: the
//! classifier folds every failure into [`Rejection::Unexpected`](crate::Rejection::Unexpected)
//! and hands the full error to the diagnostics sink.

use http::{HeaderMap, StatusCode};

/// Why a request to the recipients API did not yield a decoded body.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Connection, DNS or TLS failure reported by `reqwest`.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The request exceeded the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// A 2xx response whose body was not valid JSON.
    #[error("Failed to decode response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to decode
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// A non-2xx response whose body was not valid JSON.
    ///
    /// Non-2xx responses with a JSON body are not errors at this layer; they
    /// are handed to the classifier like any other body.
    #[error("HTTP error {status}: {raw_response}")]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
        /// Rate limit information parsed from headers
        rate_limit_info: Option<crate::rate_limit::RateLimitInfo>,
    },

    /// Invalid client configuration, such as a malformed header or API key.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// All retry attempts were used up.
    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        /// The number of attempts made
        attempts: usize,
        /// The last error encountered
        last_error: Box<Error>,
    },

    /// The request payload could not be serialized to JSON.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// The base URL or a request path could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` if a retry has a chance of succeeding.
    ///
    /// Network errors, timeouts, 5xx and 429 responses are retryable.
    ///
    /// ```
    /// use contactdb::Error;
    /// use http::StatusCode;
    ///
    /// let err = Error::HttpError {
    ///     status: StatusCode::BAD_GATEWAY,
    ///     raw_response: "<html>bad gateway</html>".to_string(),
    ///     headers: http::HeaderMap::new(),
    ///     rate_limit_info: None,
    /// };
    /// assert!(err.is_retryable());
    ///
    /// let err = Error::ConfigurationError("bad header".to_string());
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => !e.is_builder(),
            Error::Timeout => true,
            Error::HttpError { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Error::DeserializationFailed { .. }
            | Error::ConfigurationError(_)
            | Error::MaxRetriesExceeded { .. }
            | Error::SerializationFailed(_)
            | Error::InvalidUrl(_) => false,
        }
    }

    /// Returns the HTTP status code if a response was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpError { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            Error::MaxRetriesExceeded { last_error, .. } => last_error.status(),
            _ => None,
        }
    }

    /// Returns the raw response body if a response was received.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::HttpError { raw_response, .. } => Some(raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            Error::MaxRetriesExceeded { last_error, .. } => last_error.raw_response(),
            _ => None,
        }
    }

    /// Returns rate limit information carried by an [`Error::HttpError`].
    pub fn rate_limit_info(&self) -> Option<&crate::rate_limit::RateLimitInfo> {
        match self {
            Error::HttpError {
                rate_limit_info, ..
            } => rate_limit_info.as_ref(),
            _ => None,
        }
    }

    /// Returns the wait suggested by rate limit headers, capped at `max_wait`.
    pub fn rate_limit_delay(&self, max_wait: std::time::Duration) -> Option<std::time::Duration> {
        self.rate_limit_info()?.delay(max_wait)
    }
}

/// Result alias for transport and configuration operations.
pub type Result<T> = std::result::Result<T, Error>;
