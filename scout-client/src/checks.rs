//! Check-fetch API endpoints

use tracing::debug;

use crate::CoordinatorClient;
use crate::error::Result;
use scout_core::dto::check::{CheckBatch, FetchChecks};

impl CoordinatorClient {
    /// Fetch due checks assigned to a plugin
    ///
    /// Asks the coordinator for up to `limit` statuses whose next check has
    /// expired, together with the referenced check, group and object records.
    /// The coordinator bumps the next-check timestamp of everything it
    /// returns, so a status is handed to one worker at a time.
    ///
    /// # Arguments
    /// * `limit` - Maximum number of statuses to return
    /// * `plugin_name` - Only checks handled by this plugin
    /// * `group_names` - Restrict to these group names when set
    /// * `check_names` - Restrict to these check names when set
    pub async fn fetch_checks(
        &self,
        limit: usize,
        plugin_name: &str,
        group_names: Option<&[String]>,
        check_names: Option<&[String]>,
    ) -> Result<CheckBatch> {
        debug!(limit, plugin_name, "fetching due checks");

        let url = format!("{}/api/checks/fetch", self.base_url);
        let request = FetchChecks {
            limit,
            plugin_name: plugin_name.to_string(),
            group_names: group_names.map(<[String]>::to_vec),
            check_names: check_names.map(<[String]>::to_vec),
        };
        let response = self.client.post(&url).json(&request).send().await?;

        self.handle_response(response).await
    }
}
