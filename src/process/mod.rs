/*!
 * Process Module
 * Child process execution, output streaming and the running-process registry
 */

pub mod executor;
pub mod handle;
pub mod registry;
pub mod streaming;
pub mod types;

// Re-export for convenience
pub use executor::ProcessExecutor;
pub use handle::ProcessHandle;
pub use registry::ProcessRegistry;
pub use streaming::{spawn_drain, DrainMonitor};
pub use types::{ProcessError, ProcessResult, RejectReason, Rejected};
