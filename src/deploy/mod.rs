/*!
 * Deploy Module
 * Turning an uploaded archive into a launchable application tree
 */

pub mod entrypoint;
pub mod installer;

pub use entrypoint::find_entrypoint;
pub use installer::{extract_zip, Installer, ProvisionOutcome};
