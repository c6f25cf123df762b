//! Coordinator seam consumed by the scheduler
//!
//! The scheduler only needs two coordinator operations, so it depends on
//! this trait rather than on the HTTP client directly. Tests substitute a
//! recording mock; production hands in a [`CoordinatorClient`].

use async_trait::async_trait;

use scout_client::{CoordinatorClient, RemoteError};
use scout_core::dto::check::CheckBatch;
use scout_core::dto::status::StatusUpdate;

/// Coordinator operations the scheduling loop depends on
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Fetch up to `limit` due checks assigned to `plugin_name`
    async fn fetch_checks(
        &self,
        limit: usize,
        plugin_name: &str,
        group_names: Option<&[String]>,
        check_names: Option<&[String]>,
    ) -> Result<CheckBatch, RemoteError>;

    /// Commit a batch of status updates
    async fn commit_status_batch(&self, updates: &[StatusUpdate]) -> Result<(), RemoteError>;
}

#[async_trait]
impl Coordinator for CoordinatorClient {
    async fn fetch_checks(
        &self,
        limit: usize,
        plugin_name: &str,
        group_names: Option<&[String]>,
        check_names: Option<&[String]>,
    ) -> Result<CheckBatch, RemoteError> {
        CoordinatorClient::fetch_checks(self, limit, plugin_name, group_names, check_names).await
    }

    async fn commit_status_batch(&self, updates: &[StatusUpdate]) -> Result<(), RemoteError> {
        CoordinatorClient::commit_status_batch(self, updates).await
    }
}
