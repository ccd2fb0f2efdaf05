/*!
 * Log Sink
 * Append-only per-application log file with bounded tail reads
 */

use crate::core::limits::LOG_WAITING_PLACEHOLDER;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Snapshot of the end of a log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTail {
    /// No log file yet, or nothing but whitespace in it
    Waiting,
    /// Up to the requested number of trailing bytes
    Data(Vec<u8>),
}

impl LogTail {
    pub fn is_waiting(&self) -> bool {
        matches!(self, LogTail::Waiting)
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            LogTail::Waiting => &[],
            LogTail::Data(bytes) => bytes,
        }
    }

    /// Lossy text rendering; `Waiting` renders as the placeholder
    pub fn to_text(&self) -> String {
        match self {
            LogTail::Waiting => LOG_WAITING_PLACEHOLDER.to_string(),
            LogTail::Data(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

impl fmt::Display for LogTail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Durable log file of one application
#[derive(Debug, Clone)]
pub struct LogSink {
    path: PathBuf,
}

impl LogSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Open a long-lived append handle, creating the file if needed
    pub fn writer(&self) -> io::Result<LogWriter> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        Ok(LogWriter { file })
    }

    /// Append bytes and flush before returning
    pub fn append(&self, bytes: &[u8]) -> io::Result<()> {
        self.writer()?.append(bytes)
    }

    /// Append a timestamped supervisor line
    pub fn marker(&self, message: &str) -> io::Result<()> {
        self.append(format_marker(message).as_bytes())
    }

    /// Read at most `max_bytes` from the end of the log without modifying it
    pub fn tail(&self, max_bytes: usize) -> io::Result<LogTail> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LogTail::Waiting),
            Err(e) => return Err(e),
        };

        let len = file.metadata()?.len();
        let start = len.saturating_sub(max_bytes as u64);
        file.seek(SeekFrom::Start(start))?;

        let mut buf = Vec::with_capacity((len - start) as usize);
        file.take(max_bytes as u64).read_to_end(&mut buf)?;

        // Only the tail window is inspected, not the whole file
        if buf.iter().all(u8::is_ascii_whitespace) {
            return Ok(LogTail::Waiting);
        }
        Ok(LogTail::Data(buf))
    }

    /// Remove the log entirely; a missing file is not an error
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Open append handle to a log file
#[derive(Debug)]
pub struct LogWriter {
    file: File,
}

impl LogWriter {
    pub fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)?;
        self.file.flush()
    }

    /// Hand the underlying file to a child process as its output
    pub fn into_file(self) -> File {
        self.file
    }
}

/// Render a supervisor marker line
pub fn format_marker(message: &str) -> String {
    let now = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown-time".to_string());
    format!("[supervisor {}] {}\n", now, message)
}
