//! Failure taxonomy shared by every generation path.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const AUTH_MESSAGE: &str = "API authentication failed. Please check your API key configuration.";
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests. Please wait a moment and try again.";
pub const SERVER_MESSAGE: &str = "Service temporarily unavailable. Please try again in a few moments.";
pub const TIMEOUT_MESSAGE: &str = "Request timed out. Please try again.";
pub const NETWORK_MESSAGE: &str =
    "Unable to connect. Please check your internet connection and try again.";
pub const INVALID_FORMAT_MESSAGE: &str = "Invalid response format from API";
pub const NO_COMPATIBLE_MODEL_MESSAGE: &str =
    "Unable to find a compatible Claude model. Please check your API key and account access.";

/// Closed classification of why a generation attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Network,
    Auth,
    RateLimit,
    Timeout,
    Server,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Network => "network",
            ErrorKind::Auth => "auth",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Server => "server",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Everything except validation can be retried as-is by the user.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorKind::Validation)
    }

    /// Classifies a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorKind::Auth,
            429 => ErrorKind::RateLimit,
            s if s >= 500 => ErrorKind::Server,
            _ => ErrorKind::Unknown,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single structured failure with exactly one kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct GenerationError {
    pub kind: ErrorKind,
    pub message: String,
    /// Upstream HTTP status, when the failure came from a response.
    pub status: Option<u16>,
}

impl GenerationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout, TIMEOUT_MESSAGE)
    }

    pub fn network() -> Self {
        Self::new(ErrorKind::Network, NETWORK_MESSAGE)
    }

    pub fn invalid_format() -> Self {
        Self::new(ErrorKind::Unknown, INVALID_FORMAT_MESSAGE)
    }

    pub fn no_compatible_model() -> Self {
        Self::new(ErrorKind::Server, NO_COMPATIBLE_MODEL_MESSAGE)
    }

    /// Maps an unsuccessful status to its kind and canonical message.
    ///
    /// `detail` is the provider's own error text; it is only used for statuses
    /// that have no canonical message.
    pub fn from_status(status: u16, detail: Option<&str>) -> Self {
        let kind = ErrorKind::from_status(status);
        let message = match kind {
            ErrorKind::Auth => AUTH_MESSAGE.to_string(),
            ErrorKind::RateLimit => RATE_LIMIT_MESSAGE.to_string(),
            ErrorKind::Server => SERVER_MESSAGE.to_string(),
            _ => match detail {
                Some(detail) if !detail.trim().is_empty() => detail.to_string(),
                _ => format!("API request failed with status {}", status),
            },
        };
        Self::new(kind, message).with_status(status)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_statuses_mention_authentication() {
        for status in [401, 403] {
            let err = GenerationError::from_status(status, None);
            assert_eq!(err.kind, ErrorKind::Auth);
            assert!(err.message.contains("authentication"));
            assert_eq!(err.status, Some(status));
        }
    }

    #[test]
    fn test_rate_limit_message() {
        let err = GenerationError::from_status(429, Some("slow down"));
        assert_eq!(err.kind, ErrorKind::RateLimit);
        assert!(err.message.to_lowercase().contains("too many requests"));
    }

    #[test]
    fn test_server_statuses_are_unavailable() {
        for status in [500, 502, 503, 529] {
            let err = GenerationError::from_status(status, None);
            assert_eq!(err.kind, ErrorKind::Server);
            assert!(err.message.contains("unavailable"));
        }
    }

    #[test]
    fn test_other_status_prefers_provider_detail() {
        let err = GenerationError::from_status(400, Some("max_tokens: too large"));
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert_eq!(err.message, "max_tokens: too large");

        let err = GenerationError::from_status(418, None);
        assert_eq!(err.message, "API request failed with status 418");
    }

    #[test]
    fn test_only_validation_is_not_retryable() {
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(GenerationError::network().is_retryable());
    }

    #[test]
    fn test_display_is_message() {
        assert_eq!(GenerationError::timeout().to_string(), TIMEOUT_MESSAGE);
        assert_eq!(ErrorKind::RateLimit.to_string(), "rate_limit");
    }
}
