/*!
 * Process Executor
 * Handles OS-level process spawning with merged output capture
 */

use super::handle::ProcessHandle;
use super::streaming::spawn_drain;
use super::types::{ProcessError, ProcessResult};
use crate::core::config::LaunchConfig;
use crate::core::types::AppKey;
use crate::storage::LogSink;
use std::fs::File;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::info;

/// Launches application entrypoints as child processes
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    launch: LaunchConfig,
}

impl ProcessExecutor {
    pub fn new(launch: LaunchConfig) -> Self {
        Self { launch }
    }

    pub fn launch_config(&self) -> &LaunchConfig {
        &self.launch
    }

    /// Spawn `entrypoint` inside `dir` and start draining its output into `log`.
    ///
    /// The drain starts before this returns, so no early output is lost
    /// between spawn and registration.
    pub fn launch(
        &self,
        key: &AppKey,
        dir: &Path,
        entrypoint: &str,
        log: &LogSink,
    ) -> ProcessResult<ProcessHandle> {
        let writer = log
            .writer()
            .map_err(|e| ProcessError::SpawnFailed(format!("open log: {}", e)))?;
        let (reader, stdout, stderr) =
            combined_pipe().map_err(|e| ProcessError::PipeFailed(e.to_string()))?;

        let mut command = Command::new(&self.launch.interpreter);
        command
            .args(&self.launch.interpreter_args)
            .arg(entrypoint)
            .current_dir(dir)
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);

        let spawned = command.spawn();
        // Close the parent's copies of the write end so EOF tracks the child
        drop(command);

        let mut child = spawned
            .map_err(|e| ProcessError::SpawnFailed(format!("{}: {}", self.launch.interpreter, e)))?;

        let drain = match spawn_drain(key, reader, writer) {
            Ok(drain) => drain,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProcessError::SpawnFailed(format!("start log drain: {}", e)));
            }
        };

        let handle = ProcessHandle::new(key.clone(), entrypoint.to_string(), child, drain);
        info!(
            tenant = %key.tenant,
            app = %key.name,
            pid = handle.pid(),
            entrypoint = %entrypoint,
            "Spawned application process"
        );
        Ok(handle)
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(LaunchConfig::default())
    }
}

/// One pipe shared by stdout and stderr of the child.
///
/// Both ends are close-on-exec so concurrently spawned children never inherit
/// each other's pipes; the child's stdio copies are dup'd without the flag.
#[cfg(target_os = "linux")]
fn combined_pipe() -> io::Result<(File, Stdio, Stdio)> {
    use nix::fcntl::OFlag;

    let (read, write) = nix::unistd::pipe2(OFlag::O_CLOEXEC)?;
    let write_err = write.try_clone()?;
    Ok((File::from(read), Stdio::from(write), Stdio::from(write_err)))
}

// TODO: use pipe2 where available on other Unix targets; plain pipe() leaves a
// window where a concurrent spawn can inherit the write end and delay EOF.
#[cfg(all(unix, not(target_os = "linux")))]
fn combined_pipe() -> io::Result<(File, Stdio, Stdio)> {
    let (read, write) = nix::unistd::pipe()?;
    let write_err = write.try_clone()?;
    Ok((File::from(read), Stdio::from(write), Stdio::from(write_err)))
}
