//! Status-update API endpoints

use tracing::debug;

use crate::CoordinatorClient;
use crate::error::Result;
use scout_core::dto::status::StatusUpdate;

impl CoordinatorClient {
    /// Commit a batch of status updates
    ///
    /// Marks the referenced statuses as complete on the coordinator side.
    /// Partial application on failure is outside the caller's control.
    ///
    /// # Arguments
    /// * `updates` - The status updates to commit
    pub async fn commit_status_batch(&self, updates: &[StatusUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        debug!(count = updates.len(), "committing status updates");

        let url = format!("{}/api/status/batch", self.base_url);
        let response = self.client.post(&url).json(updates).send().await?;

        self.handle_empty_response(response).await
    }
}
