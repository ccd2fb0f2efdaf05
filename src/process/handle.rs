/*!
 * Process Handle
 * A live child process bound to one application key
 */

use super::streaming::DrainMonitor;
use super::types::{ProcessError, ProcessResult};
use crate::core::types::{AppKey, OsPid};
use parking_lot::Mutex;
use std::process::{Child, ExitStatus};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{kill, Signal};
#[cfg(unix)]
use nix::unistd::Pid as NixPid;

#[derive(Debug)]
pub struct ProcessHandle {
    key: AppKey,
    os_pid: OsPid,
    entrypoint: String,
    started_at: SystemTime,
    // None once handed to a reaper thread
    child: Mutex<Option<Child>>,
    drain: DrainMonitor,
}

impl ProcessHandle {
    pub fn new(key: AppKey, entrypoint: String, child: Child, drain: DrainMonitor) -> Self {
        Self {
            key,
            os_pid: child.id(),
            entrypoint,
            started_at: SystemTime::now(),
            child: Mutex::new(Some(child)),
            drain,
        }
    }

    pub fn key(&self) -> &AppKey {
        &self.key
    }

    pub fn pid(&self) -> OsPid {
        self.os_pid
    }

    pub fn entrypoint(&self) -> &str {
        &self.entrypoint
    }

    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Exit status if the process has terminated, reaping it if needed
    pub fn exit_status(&self) -> Option<ExitStatus> {
        let mut guard = self.child.lock();
        let child = guard.as_mut()?;
        match child.try_wait() {
            Ok(status) => status,
            Err(e) => {
                warn!(pid = self.os_pid, error = %e, "Failed to query process status");
                None
            }
        }
    }

    /// Whether the process is known to have terminated
    pub fn has_exited(&self) -> bool {
        let mut guard = self.child.lock();
        match guard.as_mut() {
            None => true,
            Some(child) => !matches!(child.try_wait(), Ok(None)),
        }
    }

    /// Request graceful termination (SIGTERM).
    ///
    /// A process that has already exited is not an error. The status check and
    /// the signal happen under the child lock, so the signal never reaches a
    /// reaped (and possibly reused) PID.
    pub fn terminate(&self) -> ProcessResult<()> {
        let mut guard = self.child.lock();
        let Some(child) = guard.as_mut() else {
            return Ok(());
        };
        if let Ok(Some(_)) = child.try_wait() {
            return Ok(());
        }
        send_terminate(self.os_pid)
    }

    /// Kill immediately and reap. Used to roll back a process that was never registered.
    pub fn kill(&self) -> ProcessResult<()> {
        let mut guard = self.child.lock();
        let Some(child) = guard.as_mut() else {
            return Ok(());
        };
        if let Ok(Some(_)) = child.try_wait() {
            return Ok(());
        }
        child.kill().map_err(|e| ProcessError::SignalFailed {
            pid: self.os_pid,
            reason: e.to_string(),
        })?;
        let _ = child.wait();
        Ok(())
    }

    /// Wait up to `timeout` for the output stream to reach end-of-input
    pub fn wait_for_drain(&self, timeout: Duration) -> bool {
        self.drain.wait(timeout)
    }

    pub fn drain_finished(&self) -> bool {
        self.drain.is_finished()
    }

    /// Reap the child on a detached thread so it never lingers as a zombie
    pub fn reap_detached(&self) {
        let Some(mut child) = self.child.lock().take() else {
            return;
        };
        if let Ok(Some(status)) = child.try_wait() {
            debug!(pid = self.os_pid, status = %status, "Process already reaped");
            return;
        }

        let label = self.key.to_string();
        let pid = self.os_pid;
        let spawned = thread::Builder::new()
            .name(format!("reap-{}", pid))
            .spawn(move || match child.wait() {
                Ok(status) => info!(app = %label, pid = pid, status = %status, "Process exited"),
                Err(e) => warn!(app = %label, pid = pid, error = %e, "Failed to reap process"),
            });
        if let Err(e) = spawned {
            warn!(pid = pid, error = %e, "Failed to spawn reaper thread");
        }
    }
}

#[cfg(unix)]
fn send_terminate(pid: OsPid) -> ProcessResult<()> {
    match kill(NixPid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(ProcessError::SignalFailed {
            pid,
            reason: e.to_string(),
        }),
    }
}

#[cfg(not(unix))]
fn send_terminate(pid: OsPid) -> ProcessResult<()> {
    Err(ProcessError::SignalFailed {
        pid,
        reason: "graceful termination is only supported on Unix".to_string(),
    })
}
