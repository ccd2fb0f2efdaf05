/*!
 * Application Supervisor Library
 * Upload, extract, launch and supervise user applications per tenant
 */

pub mod api;
pub mod core;
pub mod deploy;
pub mod lifecycle;
pub mod monitoring;
pub mod process;
pub mod storage;

// Re-exports
pub use api::{ConsoleCommand, ConsoleResponse};
pub use crate::core::{
    AppKey, AppState, LaunchConfig, ProvisionConfig, SupervisorConfig, SupervisorError,
    SupervisorResult,
};
pub use lifecycle::{AppSummary, StartedProcess, Supervisor};
pub use monitoring::init_tracing;
pub use storage::{Application, ArchiveStore, LogSink, LogTail};
