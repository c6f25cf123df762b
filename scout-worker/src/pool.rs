//! Bounded worker pool
//!
//! A fixed set of worker tasks consuming queued work requests and reporting
//! outcomes back over a completion channel. The queue is bounded so a slow
//! plugin applies backpressure to the fetch cycle instead of piling up
//! checks in memory.
//!
//! Each job runs in its own child task: a panicking plugin surfaces as a
//! harness fault on the completion channel rather than silently killing the
//! worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::debug;
use uuid::Uuid;

use scout_core::domain::check::CheckContext;

use crate::job::{JobFactory, JobOutcome};
use crate::signal::Signal;

/// Queueing unit submitted to the pool
///
/// The request id equals the id of the status the job will update.
#[derive(Debug)]
pub struct WorkRequest {
    pub id: Uuid,
    pub context: CheckContext,
}

/// Finished work request reported by a worker
#[derive(Debug)]
pub struct Completion {
    pub id: Uuid,
    pub outcome: JobOutcome,
}

/// Errors raised when queueing a work request
#[derive(Debug, Error)]
pub enum SubmitError {
    /// No queue slot freed up within the submit timeout
    #[error("worker queue is full")]
    QueueFull,

    /// The pool no longer accepts work
    #[error("worker pool is shut down")]
    Dismissed,
}

/// Fixed-size pool of check-executing worker tasks
pub struct WorkerPool {
    queue_tx: mpsc::Sender<WorkRequest>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    dismiss_tx: watch::Sender<bool>,
    /// Submitted requests not yet drained; an estimate, not a guarantee
    in_flight: Arc<AtomicUsize>,
    undrained: Arc<AtomicUsize>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `workers` worker tasks sharing a queue of `capacity` slots
    ///
    /// `wake` is set once more than `result_threshold` completions are
    /// waiting to be drained, so the control loop commits results before its
    /// next scheduled poll.
    pub fn new(
        workers: usize,
        capacity: usize,
        result_threshold: usize,
        wake: Signal,
        factory: Arc<dyn JobFactory>,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(capacity);
        let queue_rx = Arc::new(Mutex::new(queue_rx));
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (dismiss_tx, dismiss_rx) = watch::channel(false);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let undrained = Arc::new(AtomicUsize::new(0));

        let workers = (0..workers)
            .map(|idx| {
                let worker = Worker {
                    factory: Arc::clone(&factory),
                    queue: Arc::clone(&queue_rx),
                    completions: completion_tx.clone(),
                    dismissed: dismiss_rx.clone(),
                    undrained: Arc::clone(&undrained),
                    result_threshold,
                    wake: wake.clone(),
                };
                tokio::spawn(worker.run(idx))
            })
            .collect();

        Self {
            queue_tx,
            completion_rx,
            dismiss_tx,
            in_flight,
            undrained,
            workers,
        }
    }

    /// Enqueue a work request, waiting up to `timeout` for a free slot
    pub async fn submit(&self, request: WorkRequest, timeout: Duration) -> Result<(), SubmitError> {
        match self.queue_tx.send_timeout(request, timeout).await {
            Ok(()) => {
                self.in_flight.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(mpsc::error::SendTimeoutError::Timeout(_)) => Err(SubmitError::QueueFull),
            Err(mpsc::error::SendTimeoutError::Closed(_)) => Err(SubmitError::Dismissed),
        }
    }

    /// Drain all completions arrived since the last drain, in arrival order
    ///
    /// Non-blocking; an empty result just means nothing finished yet.
    pub fn drain(&mut self) -> Vec<Completion> {
        let mut finished = Vec::new();
        while let Ok(completion) = self.completion_rx.try_recv() {
            finished.push(completion);
        }

        if !finished.is_empty() {
            self.in_flight.fetch_sub(finished.len(), Ordering::SeqCst);
        }
        self.undrained.store(0, Ordering::SeqCst);

        finished
    }

    /// Approximate number of submitted requests not yet drained
    pub fn queue_len(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Number of worker tasks
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop workers after their current job
    ///
    /// Queued requests are abandoned rather than drained; the coordinator
    /// reschedules whatever was never committed.
    pub fn dismiss(&self) {
        let _ = self.dismiss_tx.send(true);
    }
}

struct Worker {
    factory: Arc<dyn JobFactory>,
    queue: Arc<Mutex<mpsc::Receiver<WorkRequest>>>,
    completions: mpsc::UnboundedSender<Completion>,
    dismissed: watch::Receiver<bool>,
    undrained: Arc<AtomicUsize>,
    result_threshold: usize,
    wake: Signal,
}

impl Worker {
    async fn run(mut self, idx: usize) {
        debug!(worker = idx, "worker started");

        loop {
            if *self.dismissed.borrow() {
                break;
            }

            let request = {
                let mut queue = self.queue.lock().await;
                tokio::select! {
                    _ = self.dismissed.changed() => None,
                    request = queue.recv() => request,
                }
            };

            let Some(request) = request else { break };

            let id = request.id;
            debug!(status_id = %id, worker = idx, "work request started");

            let outcome = execute(Arc::clone(&self.factory), request).await;

            if self.completions.send(Completion { id, outcome }).is_err() {
                break;
            }

            if self.undrained.fetch_add(1, Ordering::SeqCst) + 1 > self.result_threshold {
                self.wake.set();
            }
        }

        debug!(worker = idx, "worker stopped");
    }
}

/// Run one request in a child task so a panic inside the plugin surfaces as
/// a harness fault instead of killing the worker
async fn execute(factory: Arc<dyn JobFactory>, request: WorkRequest) -> JobOutcome {
    let handle = tokio::spawn(async move {
        let mut job = factory.create_job(&request.context)?;
        job.run().await
    });

    match handle.await {
        Ok(Ok(report)) => JobOutcome::Success(report),
        Ok(Err(error)) => JobOutcome::Failure(error),
        Err(join_error) => JobOutcome::HarnessFault(join_error.to_string()),
    }
}
