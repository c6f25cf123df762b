//! Status-update DTOs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::status::{CheckReport, CheckState, Status};

/// Status update committed by a worker to the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status_id: Uuid,
    pub sequence_id: i64,
    pub state: CheckState,
    pub message: String,
    pub infos: HashMap<String, serde_json::Value>,
}

impl StatusUpdate {
    /// Normalize a check report into the update committed for `status`
    ///
    /// A report-level infos override wins over the infos already attached to
    /// the status row.
    pub fn from_report(status: &Status, report: CheckReport) -> Self {
        Self {
            status_id: status.id,
            sequence_id: status.sequence_id,
            state: report.state,
            message: report.message,
            infos: report.infos.unwrap_or_else(|| status.infos.clone()),
        }
    }
}
