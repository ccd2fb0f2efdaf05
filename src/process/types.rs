/*!
 * Process Types
 * Common types for process management
 */

use crate::core::types::OsPid;
use crate::core::SupervisorError;
use thiserror::Error;

/// Process operation result
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Process errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Output pipe setup failed: {0}")]
    PipeFailed(String),

    #[error("Signal to PID {pid} failed: {reason}")]
    SignalFailed { pid: OsPid, reason: String },
}

impl From<ProcessError> for SupervisorError {
    fn from(err: ProcessError) -> Self {
        SupervisorError::ProcessSpawnFailure(err.to_string())
    }
}

/// Why the registry refused a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The key already has a registered handle
    AlreadyRegistered,
    /// The registry is at its global capacity
    AtCapacity { capacity: usize },
}

/// A refused registration; gives the handle back so the caller can clean it up
#[derive(Debug)]
pub struct Rejected<H> {
    pub reason: RejectReason,
    pub handle: H,
}
