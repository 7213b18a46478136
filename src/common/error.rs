//! Error types for the application.

use std::time::Duration;

use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

/// Errors from the external collaborators (management API, messaging platform, history sink).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API rejected '{operation}' (code {code}): {message}")]
    Api {
        operation: &'static str,
        code: i64,
        message: String,
    },

    #[error("'{operation}' timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("History sink error: {0}")]
    History(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl GatewayError {
    /// Whether this failure came from the call deadline rather than the remote side.
    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Timeout { .. })
    }
}

/// Result type alias for collaborator calls.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_timeout() {
        let timeout = GatewayError::Timeout {
            operation: "send_private",
            after: Duration::from_secs(10),
        };
        assert!(timeout.is_timeout());
        assert_eq!(timeout.to_string(), "'send_private' timed out after 10s");

        let rejected = GatewayError::Api {
            operation: "send_private",
            code: 403,
            message: "blocked".to_string(),
        };
        assert!(!rejected.is_timeout());
    }
}
