/*!
 * Lifecycle Types
 * Results and snapshots returned to the control plane
 */

use crate::core::serde::system_time_micros;
use crate::core::types::{AppState, OsPid};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// A process that was started and registered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StartedProcess {
    pub pid: OsPid,
    pub entrypoint: String,
    #[serde(with = "system_time_micros")]
    pub started_at: SystemTime,
}

/// Status snapshot of one application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AppSummary {
    pub name: String,
    pub running: bool,
    pub state: AppState,
    #[serde(skip_serializing_if = "crate::core::serde::is_none", default)]
    pub pid: Option<OsPid>,
    /// Trailing log text, capped at the configured tail size
    pub log_tail: String,
}
