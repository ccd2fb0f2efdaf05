/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Supervisor operation result
pub type SupervisorResult<T> = Result<T, SupervisorError>;

/// Lifecycle and storage errors with serialization support.
///
/// The first six variants form the start-time taxonomy; each of them is also
/// written as a marker into the application's log before being returned.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SupervisorError {
    #[error("No archive uploaded for {0}")]
    #[diagnostic(
        code(lifecycle::archive_not_found),
        help("Upload a .zip archive for the application before starting it.")
    )]
    ArchiveNotFound(String),

    #[error("Failed to extract archive: {0}")]
    #[diagnostic(
        code(lifecycle::extraction_failure),
        help("The archive may be corrupt. Re-upload a valid .zip archive.")
    )]
    ExtractionFailure(String),

    #[error("No entrypoint found, expected one of: {}", candidates.join(", "))]
    #[diagnostic(
        code(lifecycle::entrypoint_not_found),
        help("Place one of the recognized entrypoint files at the root of the archive.")
    )]
    EntrypointNotFound { candidates: Vec<String> },

    #[error("Application {0} is already running")]
    #[diagnostic(
        code(lifecycle::already_running),
        help("Stop or restart the application instead.")
    )]
    AlreadyRunning(String),

    #[error("Capacity exceeded: {limit} applications already running")]
    #[diagnostic(
        code(lifecycle::capacity_exceeded),
        help("Stop another application to free a slot.")
    )]
    CapacityExceeded { limit: usize },

    #[error("Failed to spawn process: {0}")]
    #[diagnostic(
        code(lifecycle::spawn_failure),
        help("Check that the configured interpreter is installed and executable.")
    )]
    ProcessSpawnFailure(String),

    #[error("Invalid name {name:?}: {reason}")]
    #[diagnostic(
        code(storage::invalid_name),
        help("Names must be a single path segment without separators or a leading '.'.")
    )]
    InvalidName { name: String, reason: String },

    #[error("Storage error: {0}")]
    #[diagnostic(code(storage::io), help("Check permissions and free space of the storage root."))]
    Storage(String),
}

impl SupervisorError {
    /// Wrap an I/O error with the operation that produced it
    pub fn storage(context: impl std::fmt::Display, err: std::io::Error) -> Self {
        SupervisorError::Storage(format!("{}: {}", context, err))
    }

    /// Whether this error belongs to the start-time failure taxonomy
    pub fn is_start_failure(&self) -> bool {
        !matches!(
            self,
            SupervisorError::InvalidName { .. } | SupervisorError::Storage(_)
        )
    }
}
