/*!
 * Installer
 *
 * Materializes an application's extracted tree from its archive and makes a
 * best-effort attempt at provisioning dependencies.
 *
 * Extraction and provisioning both happen in a staging directory unique to the
 * call, which is renamed into place once complete. An application therefore
 * never looks extracted after a failed extraction or while its dependencies are
 * still being installed, and concurrent callers converge on one tree. Losers of
 * that race may have provisioned too; their staging tree is discarded.
 */

use crate::core::config::ProvisionConfig;
use crate::core::limits::STAGING_DIR_PREFIX;
use crate::core::{SupervisorError, SupervisorResult};
use crate::storage::archive::{remove_dir_if_present, Application};
use crate::storage::LogSink;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of the provisioning step; never fatal to installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// Provisioning disabled or no manifest present
    Skipped,
    Succeeded,
    Failed(String),
}

/// One-shot, idempotent application installer
#[derive(Debug, Clone, Default)]
pub struct Installer {
    provision: Option<ProvisionConfig>,
}

impl Installer {
    pub fn new(provision: Option<ProvisionConfig>) -> Self {
        Self { provision }
    }

    /// Return the extracted tree, extracting and provisioning it first if needed
    pub fn ensure_ready(&self, app: &Application) -> SupervisorResult<PathBuf> {
        let extracted = app.extracted_path();
        if extracted.is_dir() {
            return Ok(extracted);
        }

        let archive = app.archive_path();
        if !archive.is_file() {
            return Err(SupervisorError::ArchiveNotFound(app.key.to_string()));
        }

        let staging = app
            .storage_path
            .join(format!("{}{}", STAGING_DIR_PREFIX, Uuid::new_v4().simple()));

        let files = match extract_zip(&archive, &staging) {
            Ok(files) => files,
            Err(e) => {
                let _ = remove_dir_if_present(&staging);
                return Err(SupervisorError::ExtractionFailure(e.to_string()));
            }
        };

        info!(app = %app.key, files = files, "Archive extracted");

        let outcome = self.provision(&staging, &app.log_sink());
        if let ProvisionOutcome::Failed(reason) = &outcome {
            warn!(app = %app.key, reason = %reason, "Dependency provisioning failed");
        }

        if let Err(e) = fs::rename(&staging, &extracted) {
            let _ = remove_dir_if_present(&staging);
            if extracted.is_dir() {
                debug!(app = %app.key, "Concurrent extraction won, reusing its tree");
                return Ok(extracted);
            }
            return Err(SupervisorError::ExtractionFailure(format!(
                "install extracted tree: {}",
                e
            )));
        }

        Ok(extracted)
    }

    /// Run the provisioning command if its manifest is present.
    ///
    /// Command output is appended to the application log.
    pub fn provision(&self, dir: &Path, log: &LogSink) -> ProvisionOutcome {
        let Some(config) = &self.provision else {
            return ProvisionOutcome::Skipped;
        };
        if !dir.join(&config.manifest).is_file() {
            return ProvisionOutcome::Skipped;
        }

        let _ = log.marker(&format!("installing dependencies from {}", config.manifest));

        let outcome = match run_provision(config, dir, log) {
            Ok(status) if status.success() => ProvisionOutcome::Succeeded,
            Ok(status) => ProvisionOutcome::Failed(format!("{} exited with {}", config.program, status)),
            Err(e) => ProvisionOutcome::Failed(format!("{}: {}", config.program, e)),
        };

        if let ProvisionOutcome::Failed(reason) = &outcome {
            let _ = log.marker(&format!("dependency install failed: {}", reason));
        }
        outcome
    }
}

fn run_provision(
    config: &ProvisionConfig,
    dir: &Path,
    log: &LogSink,
) -> io::Result<std::process::ExitStatus> {
    let output = log.writer()?.into_file();
    let errors = output.try_clone()?;

    Command::new(&config.program)
        .args(&config.args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(output)
        .stderr(errors)
        .status()
}

/// Extract a zip archive into `dest`, returning the number of files written.
///
/// Entries whose names would escape `dest` are skipped.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> zip::result::ZipResult<usize> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    fs::create_dir_all(dest)?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = %entry.name(), "Skipping archive entry outside extraction root");
            continue;
        };
        let outpath = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&outpath)?;
        io::copy(&mut entry, &mut outfile)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode & 0o7777))?;
            }
        }

        written += 1;
    }

    Ok(written)
}
