//! TCP connect probe
//!
//! The simplest useful check: open a TCP connection to the monitored object
//! and report how long it took. Per-check parameters:
//! - `port` (required)
//! - `timeout_ms` (optional, default 5000)
//! - `warn_above_ms` (optional; slower connects degrade to WARNING)

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::debug;

use scout_core::domain::check::CheckContext;
use scout_core::domain::status::{CheckReport, CheckState};
use scout_worker::{Job, JobError, JobFactory};

const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Factory turning fetched checks into TCP connect jobs
pub struct TcpConnectFactory;

impl JobFactory for TcpConnectFactory {
    fn create_job(&self, context: &CheckContext) -> Result<Box<dyn Job>, JobError> {
        let params = &context.check.parameters;

        let port = params.get("port").and_then(Value::as_u64).ok_or_else(|| {
            JobError::Misconfigured(format!(
                "check {} has no usable port parameter",
                context.check.name
            ))
        })?;
        let port = u16::try_from(port)
            .map_err(|_| JobError::Misconfigured(format!("port {port} out of range")))?;

        let timeout = params
            .get("timeout_ms")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        let warn_above = params.get("warn_above_ms").and_then(Value::as_u64);

        Ok(Box::new(TcpConnectJob {
            target: format!("{}:{}", context.object.address, port),
            timeout: Duration::from_millis(timeout),
            warn_above: warn_above.map(Duration::from_millis),
        }))
    }
}

/// One TCP connect attempt against a monitored object
pub struct TcpConnectJob {
    target: String,
    timeout: Duration,
    warn_above: Option<Duration>,
}

#[async_trait]
impl Job for TcpConnectJob {
    async fn run(&mut self) -> Result<CheckReport, JobError> {
        debug!(target = %self.target, "probing");

        let started = Instant::now();
        let connected = tokio::time::timeout(self.timeout, TcpStream::connect(&self.target)).await;
        let elapsed = started.elapsed();

        let report = match connected {
            Ok(Ok(_stream)) => {
                let slow = self.warn_above.is_some_and(|limit| elapsed > limit);
                let state = if slow {
                    CheckState::Warning
                } else {
                    CheckState::Ok
                };
                CheckReport::new(
                    state,
                    format!("connected to {} in {}ms", self.target, elapsed.as_millis()),
                )
            }
            Ok(Err(error)) => CheckReport::new(
                CheckState::Critical,
                format!("connection to {} failed: {}", self.target, error),
            ),
            Err(_) => CheckReport::new(
                CheckState::Critical,
                format!(
                    "connection to {} timed out after {}ms",
                    self.target,
                    self.timeout.as_millis()
                ),
            ),
        };

        let mut infos = HashMap::new();
        infos.insert(
            "latency_ms".to_string(),
            serde_json::json!(elapsed.as_millis() as u64),
        );

        Ok(report.with_infos(infos))
    }
}
