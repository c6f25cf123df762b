//! Job execution seam for plugins
//!
//! A plugin provides a [`JobFactory`] that turns fetched check contexts into
//! runnable [`Job`]s. The pool reports every finished request as a
//! [`JobOutcome`] so the scheduler can tell an ordinary check failure from a
//! fault of the execution harness itself.

use async_trait::async_trait;
use thiserror::Error;

use scout_core::domain::check::CheckContext;
use scout_core::domain::status::CheckReport;

/// Errors raised by plugin jobs
#[derive(Debug, Error)]
pub enum JobError {
    /// The plugin cannot build or run a job for this check
    #[error("plugin misconfiguration: {0}")]
    Misconfigured(String),

    /// The check could not be executed
    #[error(transparent)]
    Execution(#[from] anyhow::Error),
}

/// One runnable check execution
#[async_trait]
pub trait Job: Send {
    /// Execute the check and produce its report
    async fn run(&mut self) -> Result<CheckReport, JobError>;
}

/// Per-plugin hook creating jobs from fetched checks
pub trait JobFactory: Send + Sync {
    /// Build the job that will execute `context`
    fn create_job(&self, context: &CheckContext) -> Result<Box<dyn Job>, JobError>;
}

/// Outcome of one work request
#[derive(Debug)]
pub enum JobOutcome {
    /// The job produced a report to commit
    Success(CheckReport),

    /// The job failed in a well-formed way; the check stays uncommitted and
    /// the coordinator will reschedule it
    Failure(JobError),

    /// The execution harness itself misbehaved (a panicked job task); the
    /// worker process cannot safely continue
    HarnessFault(String),
}
