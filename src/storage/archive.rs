/*!
 * Archive Store
 * Tenant-scoped, application-scoped durable storage on the local filesystem
 *
 * Layout: `<root>/<tenant>/<name>/{app.zip, extracted/, logs.txt}`
 */

use super::log_sink::LogSink;
use crate::core::limits::{ARCHIVE_FILE_NAME, EXTRACTED_DIR_NAME, LOG_FILE_NAME};
use crate::core::types::{validate_segment, AppKey};
use crate::core::{SupervisorError, SupervisorResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Snapshot of an application's durable state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Application {
    pub key: AppKey,
    pub storage_path: PathBuf,
    pub has_archive: bool,
    pub is_extracted: bool,
    pub log_path: PathBuf,
}

impl Application {
    pub fn archive_path(&self) -> PathBuf {
        self.storage_path.join(ARCHIVE_FILE_NAME)
    }

    pub fn extracted_path(&self) -> PathBuf {
        self.storage_path.join(EXTRACTED_DIR_NAME)
    }

    pub fn log_sink(&self) -> LogSink {
        LogSink::new(self.log_path.clone())
    }

    /// Whether any durable state exists for the application
    pub fn exists(&self) -> bool {
        self.storage_path.is_dir()
    }
}

/// Local filesystem store rooted at a single directory
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn tenant_dir(&self, tenant: &str) -> PathBuf {
        self.root.join(tenant)
    }

    fn app_dir(&self, key: &AppKey) -> PathBuf {
        self.tenant_dir(&key.tenant).join(&key.name)
    }

    /// Current state of the application's files
    pub fn application(&self, key: &AppKey) -> Application {
        let storage_path = self.app_dir(key);
        let has_archive = storage_path.join(ARCHIVE_FILE_NAME).is_file();
        let is_extracted = storage_path.join(EXTRACTED_DIR_NAME).is_dir();
        let log_path = storage_path.join(LOG_FILE_NAME);
        Application {
            key: key.clone(),
            storage_path,
            has_archive,
            is_extracted,
            log_path,
        }
    }

    pub fn log_sink(&self, key: &AppKey) -> LogSink {
        LogSink::new(self.app_dir(key).join(LOG_FILE_NAME))
    }

    /// Create or overwrite the archive of an application.
    ///
    /// The blob is written to a sibling temp file and renamed over the old one, so
    /// readers never observe a half-written archive. A previously extracted tree is
    /// discarded so the next start extracts the new contents. A process still running
    /// from that tree keeps the files it has open, but files it opens later are gone
    /// until it is restarted.
    pub fn save_archive(&self, key: &AppKey, bytes: &[u8]) -> SupervisorResult<Application> {
        let dir = self.app_dir(key);
        fs::create_dir_all(&dir)
            .map_err(|e| SupervisorError::storage(format!("create {}", dir.display()), e))?;

        let target = dir.join(ARCHIVE_FILE_NAME);
        let staging = dir.join(format!(".{}.{}", ARCHIVE_FILE_NAME, Uuid::new_v4().simple()));
        fs::write(&staging, bytes)
            .map_err(|e| SupervisorError::storage(format!("write {}", staging.display()), e))?;
        if let Err(e) = fs::rename(&staging, &target) {
            let _ = fs::remove_file(&staging);
            return Err(SupervisorError::storage(
                format!("replace {}", target.display()),
                e,
            ));
        }

        remove_dir_if_present(&dir.join(EXTRACTED_DIR_NAME))
            .map_err(|e| SupervisorError::storage("discard stale extracted tree", e))?;

        info!(tenant = %key.tenant, app = %key.name, bytes = bytes.len(), "Archive saved");
        Ok(self.application(key))
    }

    /// Names of a tenant's applications, sorted
    pub fn list(&self, tenant: &str) -> SupervisorResult<Vec<String>> {
        validate_segment(tenant)?;
        let dir = self.tenant_dir(tenant);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SupervisorError::storage(
                    format!("read {}", dir.display()),
                    e,
                ))
            }
        };

        let mut names: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| validate_segment(name).is_ok())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Remove all durable state of an application; missing state is fine
    pub fn remove(&self, key: &AppKey) -> SupervisorResult<()> {
        let dir = self.app_dir(key);
        remove_dir_if_present(&dir)
            .map_err(|e| SupervisorError::storage(format!("remove {}", dir.display()), e))?;
        debug!(tenant = %key.tenant, app = %key.name, "Application storage removed");
        Ok(())
    }
}

pub(crate) fn remove_dir_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
