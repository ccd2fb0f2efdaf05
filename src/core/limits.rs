/*!
 * System Limits and Constants
 *
 * Centralized location for supervisor-wide limits, defaults and file layout names.
 * Grouped by domain; every value here is overridable through `SupervisorConfig`
 * unless it describes on-disk layout.
 */

use std::time::Duration;

// =============================================================================
// PROCESS LIMITS
// =============================================================================

/// Maximum simultaneously running applications across all tenants
pub const DEFAULT_MAX_RUNNING: usize = 5;

/// How long `stop` waits for a terminated process's output to drain
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// Interval of the background sweep that reaps exited processes
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(10);

/// Read size of the log streaming task (8KB)
pub const DRAIN_CHUNK_SIZE: usize = 8 * 1024;

// =============================================================================
// LOG LIMITS
// =============================================================================

/// Maximum bytes of log returned in a status snapshot
pub const DEFAULT_LOG_TAIL_BYTES: usize = 4000;

/// Rendered when an application has produced no log content yet
pub const LOG_WAITING_PLACEHOLDER: &str = "Waiting for logs...";

// =============================================================================
// NAMING LIMITS
// =============================================================================

/// Maximum length of a tenant or application name, in bytes
pub const MAX_NAME_LEN: usize = 128;

// =============================================================================
// STORAGE LAYOUT
// =============================================================================

/// Default storage root, relative to the working directory
pub const DEFAULT_STORAGE_ROOT: &str = "uploads";

/// Archive blob file name inside an application directory
pub const ARCHIVE_FILE_NAME: &str = "app.zip";

/// Extracted tree directory name inside an application directory
pub const EXTRACTED_DIR_NAME: &str = "extracted";

/// Log file name inside an application directory
pub const LOG_FILE_NAME: &str = "logs.txt";

/// Prefix of per-call staging directories used during extraction
pub const STAGING_DIR_PREFIX: &str = ".extracting-";

/// Extension accepted by file-name based uploads
pub const ARCHIVE_EXTENSION: &str = ".zip";

// =============================================================================
// LAUNCH DEFAULTS
// =============================================================================

/// Ordered entrypoint candidates; first match wins
pub const DEFAULT_ENTRYPOINTS: [&str; 3] = ["main.py", "app.py", "bot.py"];

/// Interpreter used to run the entrypoint
pub const DEFAULT_INTERPRETER: &str = "python3";

/// Interpreter flags placed before the entrypoint (unbuffered output)
pub const DEFAULT_INTERPRETER_ARGS: [&str; 1] = ["-u"];

/// Dependency manifest that triggers provisioning
pub const DEFAULT_PROVISION_MANIFEST: &str = "requirements.txt";

/// Provisioning program
pub const DEFAULT_PROVISION_PROGRAM: &str = "pip";

/// Provisioning arguments
pub const DEFAULT_PROVISION_ARGS: [&str; 3] = ["install", "-r", "requirements.txt"];
