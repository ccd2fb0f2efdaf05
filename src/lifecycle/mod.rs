/*!
 * Lifecycle Module
 * The supervisor's control surface
 */

pub mod controller;
pub mod types;

pub use controller::Supervisor;
pub use types::{AppSummary, StartedProcess};
