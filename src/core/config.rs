/*!
 * Supervisor Configuration
 *
 * Defaults come from `core::limits`; every field can be overridden through the
 * builder-style `with_*` methods or through `SUPERVISOR_*` environment variables.
 *
 * Environment variables:
 * - SUPERVISOR_STORAGE_PATH: storage root (default: uploads)
 * - SUPERVISOR_MAX_RUNNING: global capacity ceiling (default: 5)
 * - SUPERVISOR_LOG_TAIL_BYTES: status snapshot log cap (default: 4000)
 * - SUPERVISOR_STOP_GRACE_MS: drain wait on stop (default: 5000)
 * - SUPERVISOR_REAP_INTERVAL_MS: exited-process sweep interval (default: 10000)
 * - SUPERVISOR_INTERPRETER: entrypoint interpreter (default: python3)
 * - SUPERVISOR_PROVISION: "0"/"false" disables dependency provisioning
 */

use super::limits::*;
use super::serde::duration_millis;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// How an application's entrypoint is located and launched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LaunchConfig {
    /// Program that runs the entrypoint
    pub interpreter: String,
    /// Arguments placed before the entrypoint file name
    #[serde(skip_serializing_if = "crate::core::serde::is_empty_vec", default)]
    pub interpreter_args: Vec<String>,
    /// Ordered entrypoint candidates, first match wins
    pub entrypoints: Vec<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            interpreter: DEFAULT_INTERPRETER.to_string(),
            interpreter_args: DEFAULT_INTERPRETER_ARGS.iter().map(|s| s.to_string()).collect(),
            entrypoints: DEFAULT_ENTRYPOINTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl LaunchConfig {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            interpreter_args: vec![],
            entrypoints: DEFAULT_ENTRYPOINTS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.interpreter_args = args;
        self
    }

    pub fn with_entrypoints(mut self, entrypoints: Vec<String>) -> Self {
        self.entrypoints = entrypoints;
        self
    }
}

/// Best-effort dependency provisioning step run after extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProvisionConfig {
    /// File whose presence triggers provisioning
    pub manifest: String,
    pub program: String,
    #[serde(skip_serializing_if = "crate::core::serde::is_empty_vec", default)]
    pub args: Vec<String>,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            manifest: DEFAULT_PROVISION_MANIFEST.to_string(),
            program: DEFAULT_PROVISION_PROGRAM.to_string(),
            args: DEFAULT_PROVISION_ARGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ProvisionConfig {
    pub fn new(manifest: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            manifest: manifest.into(),
            program: program.into(),
            args,
        }
    }
}

/// Supervisor-wide configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SupervisorConfig {
    pub storage_root: PathBuf,
    pub max_running: usize,
    pub log_tail_bytes: usize,
    #[serde(with = "duration_millis")]
    pub stop_grace: Duration,
    #[serde(with = "duration_millis")]
    pub reap_interval: Duration,
    pub launch: LaunchConfig,
    #[serde(skip_serializing_if = "crate::core::serde::is_none", default)]
    pub provision: Option<ProvisionConfig>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            max_running: DEFAULT_MAX_RUNNING,
            log_tail_bytes: DEFAULT_LOG_TAIL_BYTES,
            stop_grace: DEFAULT_STOP_GRACE,
            reap_interval: DEFAULT_REAP_INTERVAL,
            launch: LaunchConfig::default(),
            provision: Some(ProvisionConfig::default()),
        }
    }
}

impl SupervisorConfig {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            ..Self::default()
        }
    }

    /// Build a configuration from `SUPERVISOR_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(root) = lookup("SUPERVISOR_STORAGE_PATH") {
            config.storage_root = PathBuf::from(root);
        }
        config.max_running = parse_or(&lookup, "SUPERVISOR_MAX_RUNNING", config.max_running);
        config.log_tail_bytes =
            parse_or(&lookup, "SUPERVISOR_LOG_TAIL_BYTES", config.log_tail_bytes);
        config.stop_grace = Duration::from_millis(parse_or(
            &lookup,
            "SUPERVISOR_STOP_GRACE_MS",
            config.stop_grace.as_millis() as u64,
        ));
        config.reap_interval = Duration::from_millis(parse_or(
            &lookup,
            "SUPERVISOR_REAP_INTERVAL_MS",
            config.reap_interval.as_millis() as u64,
        ));
        if config.reap_interval.is_zero() {
            warn!(
                variable = "SUPERVISOR_REAP_INTERVAL_MS",
                default_ms = DEFAULT_REAP_INTERVAL.as_millis() as u64,
                "Reap interval must be positive, using default"
            );
            config.reap_interval = DEFAULT_REAP_INTERVAL;
        }
        if let Some(interpreter) = lookup("SUPERVISOR_INTERPRETER") {
            config.launch.interpreter = interpreter;
        }
        if let Some(flag) = lookup("SUPERVISOR_PROVISION") {
            if flag == "0" || flag.eq_ignore_ascii_case("false") {
                config.provision = None;
            }
        }

        config
    }

    pub fn with_max_running(mut self, max_running: usize) -> Self {
        self.max_running = max_running;
        self
    }

    pub fn with_log_tail_bytes(mut self, bytes: usize) -> Self {
        self.log_tail_bytes = bytes;
        self
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    pub fn with_launch(mut self, launch: LaunchConfig) -> Self {
        self.launch = launch;
        self
    }

    pub fn with_provision(mut self, provision: Option<ProvisionConfig>) -> Self {
        self.provision = provision;
        self
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(variable = name, value = %raw, default = %default, "Ignoring unparseable setting");
                default
            }
        },
        None => default,
    }
}
