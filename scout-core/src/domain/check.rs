//! Check domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::status::Status;

/// Check descriptor owned by the coordinator
///
/// Describes one unit of monitoring work assigned to a plugin. Workers treat
/// checks as immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Check {
    pub id: Uuid,
    pub group_id: Uuid,
    pub object_id: Uuid,
    /// Check name within the plugin (e.g. "tcp-connect")
    pub name: String,
    /// Plugin-specific parameters (port numbers, thresholds, ...)
    pub parameters: std::collections::HashMap<String, serde_json::Value>,
}

/// A group of monitored objects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
}

/// The target a check probes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredObject {
    pub id: Uuid,
    pub name: String,
    /// Network address of the object (hostname or IP)
    pub address: String,
}

/// Everything a job needs to execute one check
///
/// Bundles the check descriptor with its owning group, the probed object and
/// the status row the execution will update.
#[derive(Debug, Clone)]
pub struct CheckContext {
    pub check: Check,
    pub group: Group,
    pub object: MonitoredObject,
    pub status: Status,
}
