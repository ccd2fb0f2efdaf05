/*!
 * API Module
 * Console control plane over stdin/stdout
 */

pub mod console;

pub use console::{execute, ConsoleCommand, ConsoleResponse, ParseError, HELP};
