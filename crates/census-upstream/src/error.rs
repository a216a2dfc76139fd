//! Error types for census-upstream

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification of an upstream failure.
///
/// The invoker retries `RateLimited` and `ServerError`; `ClientError` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// HTTP 429 or an equivalent throttling signal
    RateLimited,
    /// 5xx or an equivalent transient server fault
    ServerError,
    /// Anything else: bad request, auth, not found, decode failures
    ClientError,
}

impl StatusClass {
    /// Classify an HTTP status code.
    pub fn from_http_status(code: u16) -> Self {
        match code {
            429 => StatusClass::RateLimited,
            500..=599 => StatusClass::ServerError,
            _ => StatusClass::ClientError,
        }
    }

    /// Whether the invoker may retry a failure of this class.
    pub fn is_retryable(self) -> bool {
        matches!(self, StatusClass::RateLimited | StatusClass::ServerError)
    }
}

impl std::fmt::Display for StatusClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StatusClass::RateLimited => "rate_limited",
            StatusClass::ServerError => "server_error",
            StatusClass::ClientError => "client_error",
        };
        f.write_str(s)
    }
}

/// Error raised by any [`UpstreamApi`](crate::UpstreamApi) call.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("upstream {status} (code {}): {message}", code.map(|c| c.to_string()).unwrap_or_else(|| "-".into()))]
pub struct UpstreamError {
    /// Classification used by the retry policy
    pub status: StatusClass,
    /// Raw status code when the transport has one
    pub code: Option<u16>,
    /// Human-readable detail
    pub message: String,
}

impl UpstreamError {
    pub fn new(status: StatusClass, message: impl Into<String>) -> Self {
        Self {
            status,
            code: None,
            message: message.into(),
        }
    }

    /// Build an error from an HTTP status code and response body.
    pub fn from_http(code: u16, message: impl Into<String>) -> Self {
        Self {
            status: StatusClass::from_http_status(code),
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            status: StatusClass::RateLimited,
            code: Some(429),
            message: message.into(),
        }
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self {
            status: StatusClass::ServerError,
            code: Some(500),
            message: message.into(),
        }
    }

    pub fn client_error(message: impl Into<String>) -> Self {
        Self {
            status: StatusClass::ClientError,
            code: Some(400),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for UpstreamError {
    fn from(err: serde_json::Error) -> Self {
        UpstreamError::new(StatusClass::ClientError, format!("decode failed: {err}"))
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => UpstreamError::from_http(status.as_u16(), err.to_string()),
            // Connection resets and timeouts are transient on the server side.
            None if err.is_timeout() || err.is_connect() => {
                UpstreamError::new(StatusClass::ServerError, err.to_string())
            }
            None => UpstreamError::new(StatusClass::ClientError, err.to_string()),
        }
    }
}
