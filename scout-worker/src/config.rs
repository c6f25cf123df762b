//! Worker configuration
//!
//! Defines all configurable parameters for a plugin worker including
//! polling intervals, pool sizing and coordinator connection settings.

use std::time::Duration;

/// Worker configuration
///
/// All timeouts and limits are configurable to allow tuning for different
/// deployment scenarios (dev vs prod, fast vs slow coordinators).
#[derive(Debug, Clone)]
pub struct Config {
    /// Plugin this worker executes checks for
    pub plugin_name: String,

    /// Coordinator base URL (e.g., "http://localhost:8080")
    pub coordinator_url: String,

    /// How long to back off after a failed fetch before the next cycle
    pub fetch_retry_timeout: Duration,

    /// Number of worker tasks executing checks in parallel
    pub max_parallel_checks: usize,

    /// Maximum number of checks fetched and queued for execution
    pub max_checks_queue: usize,

    /// Interval between two fetch cycles
    pub check_poll: Duration,

    /// Timeout applied to coordinator calls; none uses the client default
    pub check_timeout: Option<Duration>,

    /// Number of pending results that wakes the loop before the next poll
    pub result_threshold: usize,

    /// Only execute checks belonging to these groups
    pub limit_group: Option<Vec<String>>,

    /// Only execute checks with these names
    pub limit_check: Option<Vec<String>>,

    /// Maximum number of status updates per commit call
    pub limit_commit: usize,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(plugin_name: impl Into<String>, coordinator_url: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            coordinator_url: coordinator_url.into(),
            fetch_retry_timeout: Duration::from_secs(10),
            max_parallel_checks: 3,
            max_checks_queue: 9,
            check_poll: Duration::from_secs(60),
            check_timeout: None,
            result_threshold: 5,
            limit_group: None,
            limit_check: None,
            limit_commit: 40,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - PLUGIN_NAME (required)
    /// - COORDINATOR_URL (required)
    /// - FETCH_RETRY_TIMEOUT (optional, seconds, default: 10)
    /// - MAX_PARALLEL_CHECKS (optional, default: 3)
    /// - MAX_CHECKS_QUEUE (optional, default: 9)
    /// - CHECK_POLL (optional, seconds, default: 60)
    /// - CHECK_TIMEOUT (optional, seconds, default: unset)
    /// - RESULT_THRESHOLD (optional, default: 5)
    /// - LIMIT_GROUP (optional, comma-separated group names)
    /// - LIMIT_CHECK (optional, comma-separated check names)
    /// - LIMIT_COMMIT (optional, default: 40)
    pub fn from_env() -> anyhow::Result<Self> {
        let plugin_name = std::env::var("PLUGIN_NAME")
            .map_err(|_| anyhow::anyhow!("PLUGIN_NAME environment variable not set"))?;

        let coordinator_url = std::env::var("COORDINATOR_URL")
            .map_err(|_| anyhow::anyhow!("COORDINATOR_URL environment variable not set"))?;

        let mut config = Self::new(plugin_name, coordinator_url);

        if let Some(secs) = read_u64("FETCH_RETRY_TIMEOUT") {
            config.fetch_retry_timeout = Duration::from_secs(secs);
        }
        if let Some(count) = read_usize("MAX_PARALLEL_CHECKS") {
            config.max_parallel_checks = count;
        }
        if let Some(count) = read_usize("MAX_CHECKS_QUEUE") {
            config.max_checks_queue = count;
        }
        if let Some(secs) = read_u64("CHECK_POLL") {
            config.check_poll = Duration::from_secs(secs);
        }
        if let Some(secs) = read_u64("CHECK_TIMEOUT") {
            config.check_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(count) = read_usize("RESULT_THRESHOLD") {
            config.result_threshold = count;
        }
        if let Ok(raw) = std::env::var("LIMIT_GROUP") {
            config.limit_group = parse_name_filter(&raw);
        }
        if let Ok(raw) = std::env::var("LIMIT_CHECK") {
            config.limit_check = parse_name_filter(&raw);
        }
        if let Some(count) = read_usize("LIMIT_COMMIT") {
            config.limit_commit = count;
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.plugin_name.is_empty() {
            anyhow::bail!("plugin_name cannot be empty");
        }

        if self.coordinator_url.is_empty() {
            anyhow::bail!("coordinator_url cannot be empty");
        }

        if !self.coordinator_url.starts_with("http://")
            && !self.coordinator_url.starts_with("https://")
        {
            anyhow::bail!("coordinator_url must start with http:// or https://");
        }

        if self.check_poll.as_secs() == 0 {
            anyhow::bail!("check_poll must be greater than 0");
        }

        if self.max_parallel_checks == 0 {
            anyhow::bail!("max_parallel_checks must be greater than 0");
        }

        if self.max_checks_queue == 0 {
            anyhow::bail!("max_checks_queue must be greater than 0");
        }

        if self.limit_commit == 0 {
            anyhow::bail!("limit_commit must be greater than 0");
        }

        Ok(())
    }
}

/// Parse a comma-separated name list, dropping empty entries
///
/// Returns `None` when nothing usable remains, so an empty variable behaves
/// like an unset one.
fn parse_name_filter(raw: &str) -> Option<Vec<String>> {
    let names: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    if names.is_empty() { None } else { Some(names) }
}

fn read_u64(var: &str) -> Option<u64> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok())
}

fn read_usize(var: &str) -> Option<usize> {
    std::env::var(var).ok().and_then(|s| s.parse::<usize>().ok())
}
