//! Scout HTTP Client
//!
//! A simple, type-safe HTTP client for communicating with the Scout coordinator API.
//!
//! This crate provides the interface workers use to pull due checks from the
//! coordinator and to push status updates back, keeping the wire details out
//! of the scheduling core.
//!
//! # Example
//!
//! ```no_run
//! use scout_client::CoordinatorClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = CoordinatorClient::new("http://localhost:8080");
//!
//!     // Fetch up to 9 due checks for the "ping" plugin
//!     let batch = client.fetch_checks(9, "ping", None, None).await?;
//!
//!     println!("Fetched {} checks", batch.status.len());
//!     Ok(())
//! }
//! ```

pub mod error;
mod checks;
mod status;

// Re-export commonly used types
pub use error::{RemoteError, Result};
pub use scout_core::dto::check::CheckBatch;
pub use scout_core::dto::status::StatusUpdate;

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Scout coordinator API
///
/// This client provides methods for the coordinator endpoints a worker needs:
/// - Fetching due checks for one plugin
/// - Committing batched status updates
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    /// Base URL of the coordinator (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl CoordinatorClient {
    /// Create a new coordinator client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the coordinator API (e.g., "http://localhost:8080")
    ///
    /// # Example
    /// ```
    /// use scout_client::CoordinatorClient;
    ///
    /// let client = CoordinatorClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Create a new coordinator client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the coordinator API
    /// * `client` - A configured reqwest Client
    ///
    /// # Example
    /// ```
    /// use scout_client::CoordinatorClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = CoordinatorClient::with_client("http://localhost:8080", http_client);
    /// ```
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the coordinator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RemoteError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| RemoteError::Parse(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content
    ///
    /// This method checks the status code and returns an error if the request failed.
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RemoteError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}
