//! Result aggregation and batched commit
//!
//! Buffers normalized status updates between cycles and commits them in
//! bounded batches. Commit failures are scoped to their batch: one rejected
//! batch never blocks the others, and the buffer is cleared after every
//! flush attempt so a flaky coordinator cannot grow worker memory.

use std::collections::HashMap;

use tracing::{debug, error};
use uuid::Uuid;

use scout_core::dto::status::StatusUpdate;

use crate::remote::Coordinator;

/// In-memory buffer of not-yet-committed status updates
pub struct ResultAggregator {
    buffer: HashMap<Uuid, StatusUpdate>,
    limit_commit: usize,
}

impl ResultAggregator {
    /// Creates an empty aggregator committing at most `limit_commit` updates
    /// per call
    pub fn new(limit_commit: usize) -> Self {
        Self {
            buffer: HashMap::new(),
            limit_commit,
        }
    }

    /// Buffer an update for the next flush
    ///
    /// A second update for the same status id replaces the first.
    pub fn record(&mut self, update: StatusUpdate) {
        self.buffer.insert(update.status_id, update);
    }

    /// Number of buffered updates
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the buffer holds no updates
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Whether an update for `status_id` is buffered
    pub fn contains(&self, status_id: &Uuid) -> bool {
        self.buffer.contains_key(status_id)
    }

    /// Commit all buffered updates in batches of at most `limit_commit`
    ///
    /// A failing batch is logged and skipped while the remaining batches
    /// still commit. The buffer is cleared unconditionally, accepting
    /// at-most-once delivery per cycle in exchange for bounded commit size.
    pub async fn flush(&mut self, client: &dyn Coordinator) {
        if self.buffer.is_empty() {
            return;
        }

        let updates: Vec<StatusUpdate> = self.buffer.drain().map(|(_, update)| update).collect();
        debug!(count = updates.len(), "committing results");

        for batch in updates.chunks(self.limit_commit) {
            if let Err(error) = client.commit_status_batch(batch).await {
                error!(count = batch.len(), "failed to commit status updates: {error}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scout_client::RemoteError;
    use scout_core::domain::status::CheckState;
    use scout_core::dto::check::CheckBatch;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Records every commit; optionally rejects the first one.
    #[derive(Default)]
    struct RecordingCoordinator {
        commits: Mutex<Vec<Vec<StatusUpdate>>>,
        fail_first_commit: AtomicBool,
    }

    #[async_trait]
    impl Coordinator for RecordingCoordinator {
        async fn fetch_checks(
            &self,
            _limit: usize,
            _plugin_name: &str,
            _group_names: Option<&[String]>,
            _check_names: Option<&[String]>,
        ) -> Result<CheckBatch, RemoteError> {
            Ok(CheckBatch::default())
        }

        async fn commit_status_batch(&self, updates: &[StatusUpdate]) -> Result<(), RemoteError> {
            let reject = self.fail_first_commit.swap(false, Ordering::SeqCst);
            self.commits.lock().unwrap().push(updates.to_vec());
            if reject {
                return Err(RemoteError::api_error(503, "coordinator unavailable"));
            }
            Ok(())
        }
    }

    fn update(sequence_id: i64) -> StatusUpdate {
        StatusUpdate {
            status_id: Uuid::new_v4(),
            sequence_id,
            state: CheckState::Ok,
            message: "connected".to_string(),
            infos: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_flush_empty_buffer_issues_no_call() {
        let client = RecordingCoordinator::default();
        let mut aggregator = ResultAggregator::new(2);

        aggregator.flush(&client).await;

        assert!(client.commits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flush_batches_cover_all_updates_once() {
        let client = RecordingCoordinator::default();
        let mut aggregator = ResultAggregator::new(2);

        let mut expected = HashSet::new();
        for sequence_id in 0..5 {
            let update = update(sequence_id);
            expected.insert(update.status_id);
            aggregator.record(update);
        }

        aggregator.flush(&client).await;

        let commits = client.commits.lock().unwrap();
        let mut sizes: Vec<usize> = commits.iter().map(Vec::len).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 2, 2]);

        let committed: Vec<Uuid> = commits
            .iter()
            .flatten()
            .map(|update| update.status_id)
            .collect();
        assert_eq!(committed.len(), 5);
        assert_eq!(committed.into_iter().collect::<HashSet<_>>(), expected);

        assert!(aggregator.is_empty());
    }

    #[tokio::test]
    async fn test_failed_batch_skipped_but_rest_commits() {
        let client = RecordingCoordinator::default();
        client.fail_first_commit.store(true, Ordering::SeqCst);
        let mut aggregator = ResultAggregator::new(2);

        for sequence_id in 0..5 {
            aggregator.record(update(sequence_id));
        }

        aggregator.flush(&client).await;

        // All three batches were attempted despite the first one failing.
        assert_eq!(client.commits.lock().unwrap().len(), 3);
        assert!(aggregator.is_empty());
    }

    #[tokio::test]
    async fn test_record_replaces_same_status_id() {
        let client = RecordingCoordinator::default();
        let mut aggregator = ResultAggregator::new(10);

        let mut first = update(1);
        first.message = "first".to_string();
        let mut second = first.clone();
        second.message = "second".to_string();

        aggregator.record(first);
        aggregator.record(second);
        assert_eq!(aggregator.len(), 1);

        aggregator.flush(&client).await;
        let commits = client.commits.lock().unwrap();
        assert_eq!(commits[0][0].message, "second");
    }
}
