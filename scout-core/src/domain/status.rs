//! Status domain types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Outcome state of a check execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckState {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl std::fmt::Display for CheckState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckState::Ok => write!(f, "OK"),
            CheckState::Warning => write!(f, "WARNING"),
            CheckState::Critical => write!(f, "CRITICAL"),
            CheckState::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Status record of one scheduled check execution
///
/// Created by the coordinator when a check becomes due, updated exactly once
/// by the worker that executes it. The status id is unique per scheduling
/// cycle; the sequence id orders successive executions of the same check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub id: Uuid,
    pub sequence_id: i64,
    pub check_id: Uuid,
    pub group_id: Uuid,
    pub object_id: Uuid,
    pub state: CheckState,
    pub message: String,
    /// Free-form details attached to the status (latency, counters, ...)
    #[serde(default)]
    pub infos: HashMap<String, serde_json::Value>,
    pub last_check: Option<chrono::DateTime<chrono::Utc>>,
    pub next_check: Option<chrono::DateTime<chrono::Utc>>,
}

/// Result of running one check
///
/// Produced by plugin jobs. The optional `infos` override replaces the
/// status-level infos in the committed update when present.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub state: CheckState,
    pub message: String,
    pub infos: Option<HashMap<String, serde_json::Value>>,
}

impl CheckReport {
    /// Report without a status-info override
    pub fn new(state: CheckState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
            infos: None,
        }
    }

    /// Attach a status-info override to the report
    pub fn with_infos(mut self, infos: HashMap<String, serde_json::Value>) -> Self {
        self.infos = Some(infos);
        self
    }
}
