//! Check scheduler
//!
//! Polls the coordinator for due checks and coordinates their execution.
//! Each cycle drains finished jobs, commits buffered results, estimates the
//! remaining queue headroom and fetches just enough new checks to fill it.
//!
//! The loop is deliberately hard to kill: remote failures back off and
//! retry, capacity problems truncate the current batch, and a failed check
//! is simply left uncommitted for the coordinator to reschedule. The only
//! fatal condition is a fault of the execution harness itself.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use scout_core::domain::check::CheckContext;
use scout_core::dto::check::CheckBatch;
use scout_core::dto::status::StatusUpdate;

use crate::config::Config;
use crate::job::{JobFactory, JobOutcome};
use crate::pool::{WorkRequest, WorkerPool};
use crate::remote::Coordinator;
use crate::results::ResultAggregator;
use crate::signal::Signal;

/// What to do about fetching this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchPlan {
    /// Queue is at capacity, skip the fetch
    QueueFull,
    /// The computed limit is unusable, skip the fetch
    Inconsistent(i64),
    /// Fetch up to this many checks
    Fetch(usize),
}

/// Validate a computed fetch limit against the queue bound
fn validate_limit(max_checks_queue: usize, limit: i64) -> FetchPlan {
    if limit == 0 {
        return FetchPlan::QueueFull;
    }
    if limit < 0 || limit > max_checks_queue as i64 {
        return FetchPlan::Inconsistent(limit);
    }
    FetchPlan::Fetch(limit as usize)
}

/// Decide how many checks to fetch given the queue gauge
///
/// The gauge is an estimate, so the raw headroom is folded back into
/// `[0, max_checks_queue]` before validation.
fn fetch_plan(max_checks_queue: usize, queue_len: usize) -> FetchPlan {
    if queue_len >= max_checks_queue {
        return FetchPlan::QueueFull;
    }

    let headroom = max_checks_queue as i64 - queue_len as i64;
    let limit = headroom.abs().min(max_checks_queue as i64);

    validate_limit(max_checks_queue, limit)
}

/// Per-plugin check scheduler
///
/// Owns the worker pool, the running-jobs map and the result buffer. Both
/// maps are touched only from the scheduling task; workers communicate
/// through the pool's completion channel.
pub struct Scheduler {
    config: Config,
    client: Arc<dyn Coordinator>,
    pool: WorkerPool,
    running: HashMap<Uuid, CheckContext>,
    results: ResultAggregator,
    wake: Signal,
    shutdown: Signal,
}

impl Scheduler {
    /// Creates a scheduler and spawns its worker pool
    pub fn new(config: Config, client: Arc<dyn Coordinator>, factory: Arc<dyn JobFactory>) -> Self {
        let wake = Signal::new();
        let pool = WorkerPool::new(
            config.max_parallel_checks,
            config.max_checks_queue,
            config.result_threshold,
            wake.clone(),
            factory,
        );

        Self {
            results: ResultAggregator::new(config.limit_commit),
            running: HashMap::new(),
            shutdown: Signal::new(),
            config,
            client,
            pool,
            wake,
        }
    }

    /// Handle that stops the scheduler at the next cycle boundary
    ///
    /// Setting the signal is idempotent; in-flight jobs finish on their own.
    pub fn shutdown_signal(&self) -> Signal {
        self.shutdown.clone()
    }

    /// Runs the scheduling loop until the shutdown signal is set
    ///
    /// Returns an error only when the execution harness faults; every other
    /// failure is logged and absorbed by the loop.
    pub async fn run(mut self) -> Result<()> {
        info!(
            plugin = %self.config.plugin_name,
            workers = self.pool.worker_count(),
            poll = ?self.config.check_poll,
            "scheduler started"
        );

        let mut first = true;

        while !self.shutdown.is_set() {
            // Sleep until the next poll, or earlier once enough results are
            // waiting. The first cycle starts fetching right away.
            if !first {
                self.wake.wait_timeout(self.config.check_poll).await;
            }
            first = false;

            if let Err(fault) = self.cycle().await {
                error!("harness fault, stopping scheduler: {fault:#}");
                self.pool.dismiss();
                return Err(fault);
            }
        }

        info!("dismissing workers");
        self.pool.dismiss();
        info!("scheduler stopped");
        Ok(())
    }

    /// One poll cycle: drain, commit, estimate, fetch, enqueue
    async fn cycle(&mut self) -> Result<()> {
        debug!(
            queued = self.pool.queue_len(),
            running = self.running.len(),
            pending = self.results.len(),
            "cycle started"
        );

        self.drain_completions()?;

        if !self.results.is_empty() {
            self.results.flush(self.client.as_ref()).await;
            self.wake.clear();
        }

        let limit = match fetch_plan(self.config.max_checks_queue, self.pool.queue_len()) {
            FetchPlan::QueueFull => {
                info!("queue estimated full");
                return Ok(());
            }
            FetchPlan::Inconsistent(limit) => {
                warn!(limit, "inconsistent fetch limit, skipping fetch");
                return Ok(());
            }
            FetchPlan::Fetch(limit) => limit,
        };

        debug!(limit, "fetching checks");
        let batch = match self
            .client
            .fetch_checks(
                limit,
                &self.config.plugin_name,
                self.config.limit_group.as_deref(),
                self.config.limit_check.as_deref(),
            )
            .await
        {
            Ok(batch) => batch,
            Err(error) => {
                error!("failed to fetch checks: {error}");
                self.shutdown
                    .wait_timeout(self.config.fetch_retry_timeout)
                    .await;
                return Ok(());
            }
        };

        if !batch.status.is_empty() {
            debug!(count = batch.status.len(), "got checks");
        }

        self.dispatch(batch).await;
        Ok(())
    }

    /// Apply every completion the pool collected since the last cycle
    fn drain_completions(&mut self) -> Result<()> {
        for completion in self.pool.drain() {
            let id = completion.id;
            match completion.outcome {
                JobOutcome::Success(report) => {
                    let Some(context) = self.running.remove(&id) else {
                        warn!(status_id = %id, "completion for unknown work request");
                        continue;
                    };

                    info!(
                        check = %context.check.name,
                        object = %context.object.name,
                        state = %report.state,
                        message = %report.message,
                        "check finished"
                    );

                    self.results
                        .record(StatusUpdate::from_report(&context.status, report));
                    if self.results.len() > self.config.result_threshold {
                        self.wake.set();
                    }
                }
                JobOutcome::Failure(error) => {
                    // Left uncommitted: the coordinator reschedules the check.
                    self.running.remove(&id);
                    error!(
                        status_id = %id,
                        "check execution failed: {:#}",
                        anyhow::Error::from(error)
                    );
                }
                JobOutcome::HarnessFault(detail) => {
                    error!(status_id = %id, "worker harness fault: {detail}");
                    return Err(anyhow!("worker harness fault on request {id}: {detail}"));
                }
            }
        }

        Ok(())
    }

    /// Queue one work request per fetched status
    async fn dispatch(&mut self, batch: CheckBatch) {
        for (idx, status) in batch.status.iter().enumerate() {
            let id = status.id;

            if self.running.contains_key(&id) {
                warn!(status_id = %id, "check already in flight, skipping");
                continue;
            }

            let Some(context) = batch.context_for(status) else {
                warn!(status_id = %id, "batch is missing referenced entities, skipping");
                continue;
            };

            let request = WorkRequest {
                id,
                context: context.clone(),
            };

            match self.pool.submit(request, self.config.check_poll).await {
                Ok(()) => {
                    self.running.insert(id, context);
                    debug!(status_id = %id, "work request queued");
                }
                Err(error) => {
                    // The coordinator reschedules whatever is dropped here.
                    error!(
                        abandoned = batch.status.len() - idx,
                        "{error}, abandoning the rest of the batch"
                    );
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Job, JobError};
    use async_trait::async_trait;
    use scout_client::RemoteError;
    use scout_core::domain::check::{Check, Group, MonitoredObject};
    use scout_core::domain::status::{CheckReport, CheckState, Status};
    use std::collections::{HashSet, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn test_config() -> Config {
        let mut config = Config::new("ping", "http://localhost:8080");
        config.max_checks_queue = 5;
        config.limit_commit = 2;
        config
    }

    /// Batch of `count` statuses, each with its own check/group/object.
    fn batch_of(count: usize) -> CheckBatch {
        let mut batch = CheckBatch::default();
        for sequence_id in 0..count {
            let check_id = Uuid::new_v4();
            let group_id = Uuid::new_v4();
            let object_id = Uuid::new_v4();

            batch.status.push(Status {
                id: Uuid::new_v4(),
                sequence_id: sequence_id as i64,
                check_id,
                group_id,
                object_id,
                state: CheckState::Unknown,
                message: String::new(),
                infos: HashMap::new(),
                last_check: None,
                next_check: None,
            });
            batch.checks.insert(
                check_id,
                Check {
                    id: check_id,
                    group_id,
                    object_id,
                    name: format!("check-{sequence_id}"),
                    parameters: HashMap::new(),
                },
            );
            batch.groups.insert(
                group_id,
                Group {
                    id: group_id,
                    name: "production".to_string(),
                },
            );
            batch.objects.insert(
                object_id,
                MonitoredObject {
                    id: object_id,
                    name: format!("host-{sequence_id}"),
                    address: "10.0.0.1".to_string(),
                },
            );
        }
        batch
    }

    /// Serves queued fetch responses, then empty batches; records commits.
    #[derive(Default)]
    struct MockCoordinator {
        fetches: Mutex<VecDeque<Result<CheckBatch, RemoteError>>>,
        fetch_calls: AtomicUsize,
        commits: Mutex<Vec<Vec<StatusUpdate>>>,
    }

    impl MockCoordinator {
        fn with_fetches(
            fetches: impl IntoIterator<Item = Result<CheckBatch, RemoteError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                fetches: Mutex::new(fetches.into_iter().collect()),
                ..Default::default()
            })
        }

        fn committed_ids(&self) -> HashSet<Uuid> {
            self.commits
                .lock()
                .unwrap()
                .iter()
                .flatten()
                .map(|update| update.status_id)
                .collect()
        }
    }

    #[async_trait]
    impl Coordinator for MockCoordinator {
        async fn fetch_checks(
            &self,
            _limit: usize,
            _plugin_name: &str,
            _group_names: Option<&[String]>,
            _check_names: Option<&[String]>,
        ) -> Result<CheckBatch, RemoteError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.fetches
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(CheckBatch::default()))
        }

        async fn commit_status_batch(&self, updates: &[StatusUpdate]) -> Result<(), RemoteError> {
            self.commits.lock().unwrap().push(updates.to_vec());
            Ok(())
        }
    }

    /// Job behavior keyed by check name; anything unlisted succeeds.
    #[derive(Default)]
    struct StubFactory {
        failing: HashSet<String>,
        panicking: HashSet<String>,
        blocking: bool,
    }

    impl JobFactory for StubFactory {
        fn create_job(&self, context: &CheckContext) -> Result<Box<dyn Job>, JobError> {
            let name = context.check.name.clone();
            let behavior = if self.panicking.contains(&name) {
                Behavior::Panic
            } else if self.failing.contains(&name) {
                Behavior::Fail
            } else if self.blocking {
                Behavior::Block
            } else {
                Behavior::Succeed
            };
            Ok(Box::new(StubJob { behavior }))
        }
    }

    enum Behavior {
        Succeed,
        Fail,
        Panic,
        Block,
    }

    struct StubJob {
        behavior: Behavior,
    }

    #[async_trait]
    impl Job for StubJob {
        async fn run(&mut self) -> Result<CheckReport, JobError> {
            match self.behavior {
                Behavior::Succeed => Ok(CheckReport::new(CheckState::Ok, "connected")),
                Behavior::Fail => Err(JobError::Execution(anyhow::anyhow!("probe refused"))),
                Behavior::Panic => panic!("stub job panicked"),
                Behavior::Block => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }
    }

    fn scheduler(client: Arc<MockCoordinator>, factory: StubFactory) -> Scheduler {
        Scheduler::new(test_config(), client, Arc::new(factory))
    }

    #[test]
    fn test_fetch_plan() {
        assert_eq!(fetch_plan(9, 0), FetchPlan::Fetch(9));
        assert_eq!(fetch_plan(9, 4), FetchPlan::Fetch(5));
        assert_eq!(fetch_plan(9, 9), FetchPlan::QueueFull);
        // A gauge running past the bound still reads as a full queue.
        assert_eq!(fetch_plan(9, 14), FetchPlan::QueueFull);
    }

    #[test]
    fn test_validate_limit_rejects_out_of_range() {
        assert_eq!(validate_limit(9, 0), FetchPlan::QueueFull);
        assert_eq!(validate_limit(9, -3), FetchPlan::Inconsistent(-3));
        assert_eq!(validate_limit(9, 12), FetchPlan::Inconsistent(12));
        assert_eq!(validate_limit(9, 9), FetchPlan::Fetch(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetched_checks_fill_running_and_queue() {
        let client = MockCoordinator::with_fetches([Ok(batch_of(5))]);
        let mut scheduler = scheduler(
            client.clone(),
            StubFactory {
                blocking: true,
                ..Default::default()
            },
        );

        scheduler.cycle().await.unwrap();

        assert_eq!(scheduler.running.len(), 5);
        assert_eq!(scheduler.pool.queue_len(), 5);
        assert!(scheduler.results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_commits_batched_and_cover_all_statuses() {
        let batch = batch_of(5);
        let expected: HashSet<Uuid> = batch.status.iter().map(|status| status.id).collect();
        let client = MockCoordinator::with_fetches([Ok(batch)]);
        let mut scheduler = scheduler(client.clone(), StubFactory::default());

        scheduler.cycle().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        scheduler.cycle().await.unwrap();

        let mut sizes: Vec<usize> = client
            .commits
            .lock()
            .unwrap()
            .iter()
            .map(Vec::len)
            .collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 2, 2]);
        assert_eq!(client.committed_ids(), expected);

        assert!(scheduler.running.is_empty());
        assert!(scheduler.results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_without_results_commits_nothing() {
        let client = MockCoordinator::with_fetches([]);
        let mut scheduler = scheduler(client.clone(), StubFactory::default());

        scheduler.cycle().await.unwrap();

        assert!(client.commits.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_backs_off_and_recovers() {
        let client = MockCoordinator::with_fetches([
            Err(RemoteError::api_error(502, "bad gateway")),
            Err(RemoteError::api_error(502, "bad gateway")),
            Ok(batch_of(5)),
        ]);
        let mut scheduler = scheduler(
            client.clone(),
            StubFactory {
                blocking: true,
                ..Default::default()
            },
        );

        let started = Instant::now();
        scheduler.cycle().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert_eq!(scheduler.pool.queue_len(), 0);

        scheduler.cycle().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(20));
        assert_eq!(scheduler.pool.queue_len(), 0);

        scheduler.cycle().await.unwrap();
        assert_eq!(client.fetch_calls.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.pool.queue_len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_check_left_for_reschedule() {
        let batch = batch_of(2);
        let failed_id = batch.status[0].id;
        let succeeded_id = batch.status[1].id;
        let client = MockCoordinator::with_fetches([Ok(batch)]);
        let mut scheduler = scheduler(
            client.clone(),
            StubFactory {
                failing: HashSet::from(["check-0".to_string()]),
                ..Default::default()
            },
        );

        scheduler.cycle().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        scheduler.cycle().await.unwrap();

        let committed = client.committed_ids();
        assert!(committed.contains(&succeeded_id));
        assert!(!committed.contains(&failed_id));
        assert!(!scheduler.running.contains_key(&failed_id));
        assert!(!scheduler.results.contains(&failed_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_harness_fault_stops_the_scheduler() {
        let client = MockCoordinator::with_fetches([Ok(batch_of(1))]);
        let mut scheduler = scheduler(
            client.clone(),
            StubFactory {
                panicking: HashSet::from(["check-0".to_string()]),
                ..Default::default()
            },
        );

        scheduler.cycle().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(scheduler.cycle().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_results_cut_the_poll_wait_short() {
        let client = MockCoordinator::with_fetches([Ok(batch_of(5))]);
        let mut config = test_config();
        config.result_threshold = 2;
        let mut scheduler = Scheduler::new(config, client.clone(), Arc::new(StubFactory::default()));

        scheduler.cycle().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Five completions are waiting, well past the threshold of two: the
        // next wait must return immediately instead of sleeping out the poll
        // interval.
        let started = Instant::now();
        assert!(scheduler.wake.wait_timeout(scheduler.config.check_poll).await);
        assert!(started.elapsed() < scheduler.config.check_poll);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_and_buffer_never_share_a_status_id() {
        let batch = batch_of(4);
        let blocked: HashSet<String> =
            HashSet::from(["check-2".to_string(), "check-3".to_string()]);
        let client = MockCoordinator::with_fetches([Ok(batch)]);

        // Two checks finish, two stay blocked on the pool.
        struct SplitFactory {
            blocked: HashSet<String>,
        }
        impl JobFactory for SplitFactory {
            fn create_job(&self, context: &CheckContext) -> Result<Box<dyn Job>, JobError> {
                let behavior = if self.blocked.contains(&context.check.name) {
                    Behavior::Block
                } else {
                    Behavior::Succeed
                };
                Ok(Box::new(StubJob { behavior }))
            }
        }

        let mut scheduler = Scheduler::new(
            test_config(),
            client.clone(),
            Arc::new(SplitFactory { blocked }),
        );

        scheduler.cycle().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        scheduler.drain_completions().unwrap();

        assert_eq!(scheduler.running.len(), 2);
        assert_eq!(scheduler.results.len(), 2);
        for id in scheduler.running.keys() {
            assert!(!scheduler.results.contains(id));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_check_not_dispatched_twice() {
        let batch = batch_of(1);
        let client = MockCoordinator::with_fetches([Ok(batch.clone()), Ok(batch)]);
        let mut scheduler = scheduler(
            client.clone(),
            StubFactory {
                blocking: true,
                ..Default::default()
            },
        );

        scheduler.cycle().await.unwrap();
        scheduler.cycle().await.unwrap();

        assert_eq!(scheduler.running.len(), 1);
        assert_eq!(scheduler.pool.queue_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_the_loop() {
        let client = MockCoordinator::with_fetches([]);
        let scheduler = scheduler(client.clone(), StubFactory::default());

        let shutdown = scheduler.shutdown_signal();
        let handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown.set();

        assert!(handle.await.unwrap().is_ok());
    }
}
