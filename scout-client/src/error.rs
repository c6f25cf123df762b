//! Error types for the Scout client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Errors raised when talking to the coordinator
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl RemoteError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status >= 400 && *status < 500)
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Api { status, .. } if *status >= 500)
    }
}
