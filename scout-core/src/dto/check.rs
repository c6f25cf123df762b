//! Check-fetch DTOs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::check::{Check, CheckContext, Group, MonitoredObject};
use crate::domain::status::Status;

/// Request for due checks assigned to one plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchChecks {
    /// Maximum number of statuses to return
    pub limit: usize,
    pub plugin_name: String,
    /// Restrict to these group names when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_names: Option<Vec<String>>,
    /// Restrict to these check names when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_names: Option<Vec<String>>,
}

/// Batch of due checks returned by the coordinator
///
/// Statuses carry the work to do; the checks/groups/objects maps hold the
/// referenced entities, keyed by id so shared entities appear once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckBatch {
    pub status: Vec<Status>,
    pub checks: HashMap<Uuid, Check>,
    pub groups: HashMap<Uuid, Group>,
    pub objects: HashMap<Uuid, MonitoredObject>,
}

impl CheckBatch {
    /// Join one status with its referenced entities
    ///
    /// Returns `None` when the batch does not contain the check, group or
    /// object the status points at.
    pub fn context_for(&self, status: &Status) -> Option<CheckContext> {
        let check = self.checks.get(&status.check_id)?;
        let group = self.groups.get(&status.group_id)?;
        let object = self.objects.get(&status.object_id)?;
        Some(CheckContext {
            check: check.clone(),
            group: group.clone(),
            object: object.clone(),
            status: status.clone(),
        })
    }
}
