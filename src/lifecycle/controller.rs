/*!
 * Lifecycle Controller
 *
 * Orchestrates upload, start, stop, restart and delete per application key by
 * composing the archive store, installer, executor and process registry.
 *
 * States per key: Uploaded -> Idle -> Running -> Idle (stop) | Deleted.
 *
 * Every operation is safe to call concurrently. Only the registry is shared
 * across keys; everything else is partitioned per key on disk.
 *
 * `restart` is `stop` followed by `start` and is not atomic: a concurrent
 * `start` between the two steps can observe the key as idle and win the
 * registration, in which case the restart reports `AlreadyRunning`.
 */

use super::types::{AppSummary, StartedProcess};
use crate::core::limits::ARCHIVE_EXTENSION;
use crate::core::types::{AppKey, AppState};
use crate::core::{SupervisorConfig, SupervisorError, SupervisorResult};
use crate::deploy::{find_entrypoint, Installer};
use crate::process::{ProcessExecutor, ProcessHandle, ProcessRegistry, RejectReason};
use crate::storage::{Application, ArchiveStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Supervisor {
    config: SupervisorConfig,
    store: ArchiveStore,
    installer: Installer,
    executor: ProcessExecutor,
    registry: ProcessRegistry<ProcessHandle>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        let store = ArchiveStore::new(config.storage_root.clone());
        let installer = Installer::new(config.provision.clone());
        let executor = ProcessExecutor::new(config.launch.clone());
        let registry = ProcessRegistry::new(config.max_running);

        info!(
            storage = %config.storage_root.display(),
            max_running = config.max_running,
            interpreter = %config.launch.interpreter,
            provisioning = config.provision.is_some(),
            "Supervisor initialized"
        );

        Self {
            config,
            store,
            installer,
            executor,
            registry,
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn store(&self) -> &ArchiveStore {
        &self.store
    }

    pub fn registry(&self) -> &ProcessRegistry<ProcessHandle> {
        &self.registry
    }

    /// Number of registered processes across all tenants
    pub fn running_count(&self) -> usize {
        self.registry.count()
    }

    // =========================================================================
    // Control plane surface
    // =========================================================================

    /// Create or overwrite an application's archive. Does not extract or start.
    ///
    /// A running instance is left alone; it picks up the new code on restart.
    pub fn upload_archive(
        &self,
        tenant: &str,
        name: &str,
        bytes: &[u8],
    ) -> SupervisorResult<Application> {
        let key = AppKey::new(tenant, name)?;
        self.store.save_archive(&key, bytes)
    }

    /// Upload keyed by a `<name>.zip` file name
    pub fn upload_archive_file(
        &self,
        tenant: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> SupervisorResult<Application> {
        let name = file_name
            .strip_suffix(ARCHIVE_EXTENSION)
            .ok_or_else(|| SupervisorError::InvalidName {
                name: file_name.to_string(),
                reason: format!("expected a {} archive", ARCHIVE_EXTENSION),
            })?;
        self.upload_archive(tenant, name, bytes)
    }

    /// Status snapshots of a tenant's applications, sorted by name
    pub fn list_applications(&self, tenant: &str) -> SupervisorResult<Vec<AppSummary>> {
        self.store
            .list(tenant)?
            .into_iter()
            .map(|name| {
                let key = AppKey::new(tenant, name)?;
                Ok(self.summarize(&key))
            })
            .collect()
    }

    pub fn status(&self, tenant: &str, name: &str) -> SupervisorResult<AppSummary> {
        let key = AppKey::new(tenant, name)?;
        Ok(self.summarize(&key))
    }

    pub fn start(&self, tenant: &str, name: &str) -> SupervisorResult<StartedProcess> {
        let key = AppKey::new(tenant, name)?;
        self.start_key(&key)
    }

    /// Returns whether a process was registered and has been asked to stop
    pub fn stop(&self, tenant: &str, name: &str) -> SupervisorResult<bool> {
        let key = AppKey::new(tenant, name)?;
        Ok(self.stop_key(&key))
    }

    pub fn restart(&self, tenant: &str, name: &str) -> SupervisorResult<StartedProcess> {
        let key = AppKey::new(tenant, name)?;
        self.stop_key(&key);
        self.start_key(&key)
    }

    /// Stop the application and remove its archive, extracted tree and log
    pub fn delete(&self, tenant: &str, name: &str) -> SupervisorResult<()> {
        let key = AppKey::new(tenant, name)?;
        self.stop_key(&key);
        self.store.remove(&key)?;
        info!(tenant = %key.tenant, app = %key.name, "Application deleted");
        Ok(())
    }

    /// Unregister every handle whose process has exited. Returns how many were reaped.
    pub fn reap_exited(&self) -> usize {
        let mut reaped = 0;
        for key in self.registry.keys() {
            if let Some(handle) = self.registry.lookup(&key) {
                if handle.has_exited() && self.reap(&key, &handle) {
                    reaped += 1;
                }
            }
        }
        if reaped > 0 {
            debug!(reaped = reaped, remaining = self.registry.count(), "Reaped exited processes");
        }
        reaped
    }

    /// Stop every registered process. Returns how many were stopped.
    pub fn shutdown(&self) -> usize {
        let keys = self.registry.keys();
        let stopped = keys.iter().filter(|key| self.stop_key(key)).count();
        info!(stopped = stopped, "Supervisor shut down");
        stopped
    }

    // =========================================================================
    // Lifecycle operations
    // =========================================================================

    fn start_key(&self, key: &AppKey) -> SupervisorResult<StartedProcess> {
        let app = self.store.application(key);

        if let Some(handle) = self.registry.lookup(key) {
            if !handle.has_exited() {
                return Err(
                    self.record_failure(&app, SupervisorError::AlreadyRunning(key.to_string()))
                );
            }
            // Previous run's trailing output goes before the new start marker
            self.reap(key, &handle);
            handle.wait_for_drain(self.config.stop_grace);
        }

        let dir = self
            .installer
            .ensure_ready(&app)
            .map_err(|e| self.record_failure(&app, e))?;

        let entrypoints = &self.config.launch.entrypoints;
        let Some(entrypoint) = find_entrypoint(&dir, entrypoints.as_slice()) else {
            return Err(self.record_failure(
                &app,
                SupervisorError::EntrypointNotFound {
                    candidates: entrypoints.clone(),
                },
            ));
        };

        let log = app.log_sink();
        let handle = self
            .executor
            .launch(key, &dir, entrypoint, &log)
            .map_err(|e| self.record_failure(&app, e.into()))?;

        match self.registry.try_register(key.clone(), handle) {
            Ok(handle) => {
                let _ = log.marker(&format!(
                    "started pid={} entrypoint={}",
                    handle.pid(),
                    handle.entrypoint()
                ));
                info!(
                    tenant = %key.tenant,
                    app = %key.name,
                    pid = handle.pid(),
                    running = self.registry.count(),
                    "Application started"
                );
                Ok(StartedProcess {
                    pid: handle.pid(),
                    entrypoint: handle.entrypoint().to_string(),
                    started_at: handle.started_at(),
                })
            }
            Err(rejected) => {
                let error = match rejected.reason {
                    RejectReason::AlreadyRegistered => {
                        SupervisorError::AlreadyRunning(key.to_string())
                    }
                    RejectReason::AtCapacity { capacity } => {
                        SupervisorError::CapacityExceeded { limit: capacity }
                    }
                };
                // Spawn and registration are separate steps; never leave an orphan
                if let Err(e) = rejected.handle.kill() {
                    warn!(pid = rejected.handle.pid(), error = %e, "Failed to kill unregistered process");
                }
                rejected.handle.wait_for_drain(self.config.stop_grace);
                Err(self.record_failure(&app, error))
            }
        }
    }

    fn stop_key(&self, key: &AppKey) -> bool {
        let Some(handle) = self.registry.unregister(key) else {
            return false;
        };
        let log = self.store.log_sink(key);

        // Best effort: a process that cannot be signaled is almost always gone
        if let Err(e) = handle.terminate() {
            debug!(pid = handle.pid(), error = %e, "Termination request failed");
        }

        if !handle.wait_for_drain(self.config.stop_grace) {
            warn!(
                tenant = %key.tenant,
                app = %key.name,
                pid = handle.pid(),
                grace_ms = self.config.stop_grace.as_millis() as u64,
                "Output still open after grace period"
            );
            let _ = log.marker(&format!(
                "pid={} still producing output after stop; trailing output may interleave",
                handle.pid()
            ));
        }
        handle.reap_detached();

        let _ = log.marker(&format!("stopped pid={}", handle.pid()));
        info!(tenant = %key.tenant, app = %key.name, pid = handle.pid(), "Application stopped");
        true
    }

    /// Registered handle for `key` whose process is still alive. An exited
    /// process found here is reaped on the spot.
    fn live_handle(&self, key: &AppKey) -> Option<Arc<ProcessHandle>> {
        let handle = self.registry.lookup(key)?;
        if !handle.has_exited() {
            return Some(handle);
        }
        self.reap(key, &handle);
        None
    }

    /// Unregister `handle` if it is still the one registered for `key`.
    ///
    /// Never waits on the drain: a descendant of the exited process may hold
    /// the output pipe open indefinitely.
    fn reap(&self, key: &AppKey, handle: &Arc<ProcessHandle>) -> bool {
        let removed = self
            .registry
            .unregister_if(key, |current| Arc::ptr_eq(current, handle));
        if removed.is_none() {
            return false;
        }

        let status = handle.exit_status();
        handle.reap_detached();

        let code = status
            .and_then(|s| s.code())
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let _ = self
            .store
            .log_sink(key)
            .marker(&format!("exited pid={} status={}", handle.pid(), code));
        info!(tenant = %key.tenant, app = %key.name, pid = handle.pid(), status = %code, "Application exited");
        true
    }

    fn summarize(&self, key: &AppKey) -> AppSummary {
        let app = self.store.application(key);
        let handle = self.live_handle(key);
        let state = match (&handle, app.is_extracted, app.has_archive) {
            (Some(_), _, _) => AppState::Running,
            (None, true, _) => AppState::Idle,
            (None, false, true) => AppState::Uploaded,
            (None, false, false) => AppState::Deleted,
        };
        let log_tail = match app.log_sink().tail(self.config.log_tail_bytes) {
            Ok(tail) => tail.to_text(),
            Err(e) => {
                warn!(app = %key, error = %e, "Failed to read log tail");
                crate::core::limits::LOG_WAITING_PLACEHOLDER.to_string()
            }
        };

        AppSummary {
            name: key.name.clone(),
            running: handle.is_some(),
            state,
            pid: handle.map(|h| h.pid()),
            log_tail,
        }
    }

    /// Write a start failure into the application's log and trace it.
    ///
    /// Nothing is written for applications without durable state, so a failed
    /// start never recreates a deleted application.
    fn record_failure(&self, app: &Application, error: SupervisorError) -> SupervisorError {
        if app.exists() {
            if let Err(e) = app.log_sink().marker(&format!("start failed: {}", error)) {
                warn!(app = %app.key, error = %e, "Failed to write log marker");
            }
        }
        warn!(tenant = %app.key.tenant, app = %app.key.name, error = %error, "Start failed");
        error
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if self.registry.count() > 0 {
            self.shutdown();
        }
    }
}
