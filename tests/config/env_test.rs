/*!
 * Environment Configuration Tests
 * These mutate process environment, so they run serially
 */

use app_supervisor::SupervisorConfig;
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::path::PathBuf;
use std::time::Duration;

const VARS: &[&str] = &[
    "SUPERVISOR_STORAGE_PATH",
    "SUPERVISOR_MAX_RUNNING",
    "SUPERVISOR_LOG_TAIL_BYTES",
    "SUPERVISOR_STOP_GRACE_MS",
    "SUPERVISOR_REAP_INTERVAL_MS",
    "SUPERVISOR_INTERPRETER",
    "SUPERVISOR_PROVISION",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();
    let config = SupervisorConfig::from_env();
    assert_eq!(config, SupervisorConfig::default());
    assert_eq!(config.storage_root, PathBuf::from("uploads"));
    assert_eq!(config.max_running, 5);
    assert_eq!(config.log_tail_bytes, 4000);
    assert_eq!(config.launch.interpreter, "python3");
    assert!(config.provision.is_some());
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_env();
    std::env::set_var("SUPERVISOR_STORAGE_PATH", "/srv/apps");
    std::env::set_var("SUPERVISOR_MAX_RUNNING", "12");
    std::env::set_var("SUPERVISOR_STOP_GRACE_MS", "250");
    std::env::set_var("SUPERVISOR_INTERPRETER", "python3.12");
    std::env::set_var("SUPERVISOR_PROVISION", "false");

    let config = SupervisorConfig::from_env();
    clear_env();

    assert_eq!(config.storage_root, PathBuf::from("/srv/apps"));
    assert_eq!(config.max_running, 12);
    assert_eq!(config.stop_grace, Duration::from_millis(250));
    assert_eq!(config.launch.interpreter, "python3.12");
    assert_eq!(config.provision, None);
}

#[test]
#[serial]
fn test_from_env_ignores_garbage() {
    clear_env();
    std::env::set_var("SUPERVISOR_MAX_RUNNING", "lots");
    let config = SupervisorConfig::from_env();
    clear_env();
    assert_eq!(config.max_running, 5);
}
