/*!
 * Storage Module
 * Archive blobs, extracted trees and application logs
 */

pub mod archive;
pub mod log_sink;

pub use archive::{Application, ArchiveStore};
pub use log_sink::{format_marker, LogSink, LogTail, LogWriter};
