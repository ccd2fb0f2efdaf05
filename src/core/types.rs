/*!
 * Core Types
 * Identity types shared across the supervisor
 */

use super::errors::{SupervisorError, SupervisorResult};
use super::limits::MAX_NAME_LEN;
use serde::{Deserialize, Serialize};
use std::fmt;

/// OS-level process ID
pub type OsPid = u32;

/// Composite identity of an application: the owning tenant plus the app name.
///
/// Both parts are used verbatim as directory names under the storage root, so
/// construction validates them as single, non-hidden path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppKey {
    pub tenant: String,
    pub name: String,
}

impl AppKey {
    pub fn new(tenant: impl Into<String>, name: impl Into<String>) -> SupervisorResult<Self> {
        let tenant = tenant.into();
        let name = name.into();
        validate_segment(&tenant)?;
        validate_segment(&name)?;
        Ok(Self { tenant, name })
    }
}

impl fmt::Display for AppKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant, self.name)
    }
}

/// Check that `segment` can be used as a single directory name
pub fn validate_segment(segment: &str) -> SupervisorResult<()> {
    let reason = if segment.is_empty() {
        Some("empty")
    } else if segment.len() > MAX_NAME_LEN {
        Some("too long")
    } else if segment.starts_with('.') {
        Some("must not start with '.'")
    } else if segment.contains(['/', '\\', '\0']) {
        Some("contains a path separator or NUL")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(SupervisorError::InvalidName {
            name: segment.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Lifecycle state of an application, derived from storage and the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    /// Archive stored, not yet extracted
    Uploaded,
    /// Extracted, no registered process
    Idle,
    /// A process is registered for the key
    Running,
    /// No durable state remains
    Deleted,
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AppState::Uploaded => "uploaded",
            AppState::Idle => "idle",
            AppState::Running => "running",
            AppState::Deleted => "deleted",
        };
        f.write_str(label)
    }
}
