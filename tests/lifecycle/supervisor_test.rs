/*!
 * Supervisor Tests
 * Upload, start, stop, restart and delete against real child processes
 */

use crate::support::{
    read_log, supervisor, test_config, upload_script, wait_until, zip_bytes, LONG_RUNNING,
};
use app_supervisor::{AppKey, AppState, LaunchConfig, Supervisor, SupervisorError};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn test_start_streams_output_and_stop_returns_to_idle() {
    let root = TempDir::new().unwrap();
    let sup = supervisor(root.path(), 5);
    upload_script(&sup, "alice", "hello", LONG_RUNNING);

    let started = sup.start("alice", "hello").unwrap();
    assert!(started.pid > 0);
    assert_eq!(started.entrypoint, "main.sh");
    assert_eq!(sup.running_count(), 1);

    assert!(wait_until(WAIT, || read_log(&sup, "alice", "hello").contains("hello")));

    let status = sup.status("alice", "hello").unwrap();
    assert!(status.running);
    assert_eq!(status.state, AppState::Running);
    assert_eq!(status.pid, Some(started.pid));
    assert!(status.log_tail.contains("hello"));

    assert!(sup.stop("alice", "hello").unwrap());
    assert_eq!(sup.running_count(), 0);

    let status = sup.status("alice", "hello").unwrap();
    assert!(!status.running);
    assert_eq!(status.state, AppState::Idle);
    assert_eq!(status.pid, None);

    let log = read_log(&sup, "alice", "hello");
    assert!(log.contains(&format!("started pid={}", started.pid)));
    assert!(log.contains(&format!("stopped pid={}", started.pid)));
}

#[test]
fn test_exited_process_is_reaped() {
    let root = TempDir::new().unwrap();
    let sup = supervisor(root.path(), 5);
    upload_script(&sup, "alice", "oneshot", "echo done\n");

    let started = sup.start("alice", "oneshot").unwrap();
    assert!(wait_until(WAIT, || sup.reap_exited() == 1 || sup.running_count() == 0));
    assert_eq!(sup.running_count(), 0);

    let status = sup.status("alice", "oneshot").unwrap();
    assert!(!status.running);
    assert!(wait_until(WAIT, || sup
        .status("alice", "oneshot")
        .unwrap()
        .log_tail
        .contains("done")));

    let log = read_log(&sup, "alice", "oneshot");
    assert!(log.contains(&format!("exited pid={} status=0", started.pid)));

    // An exited app can be started again
    sup.start("alice", "oneshot").unwrap();
}

#[test]
fn test_start_twice_reports_already_running() {
    let root = TempDir::new().unwrap();
    let sup = supervisor(root.path(), 5);
    upload_script(&sup, "alice", "bot", LONG_RUNNING);

    let first = sup.start("alice", "bot").unwrap();
    let err = sup.start("alice", "bot").unwrap_err();
    assert!(matches!(err, SupervisorError::AlreadyRunning(_)));
    assert_eq!(sup.running_count(), 1);
    assert_eq!(sup.status("alice", "bot").unwrap().pid, Some(first.pid));
}

#[test]
fn test_missing_entrypoint_is_logged() {
    let root = TempDir::new().unwrap();
    let sup = supervisor(root.path(), 5);
    sup.upload_archive("alice", "docs", &zip_bytes(&[("readme.txt", "nothing to run")]))
        .unwrap();

    let err = sup.start("alice", "docs").unwrap_err();
    assert_eq!(
        err,
        SupervisorError::EntrypointNotFound {
            candidates: vec!["main.sh".to_string()]
        }
    );
    assert_eq!(sup.running_count(), 0);

    let status = sup.status("alice", "docs").unwrap();
    assert_eq!(status.state, AppState::Idle);
    assert!(status.log_tail.contains("start failed"));
}

#[test]
fn test_start_without_upload_leaves_no_trace() {
    let root = TempDir::new().unwrap();
    let sup = supervisor(root.path(), 5);

    let err = sup.start("alice", "ghost").unwrap_err();
    assert!(matches!(err, SupervisorError::ArchiveNotFound(_)));

    let key = AppKey::new("alice", "ghost").unwrap();
    assert!(!sup.store().application(&key).exists());
    assert_eq!(sup.list_applications("alice").unwrap(), vec![]);
}

#[test]
fn test_restart_replaces_process_and_keeps_log() {
    let root = TempDir::new().unwrap();
    let sup = supervisor(root.path(), 5);
    upload_script(&sup, "alice", "bot", LONG_RUNNING);

    let first = sup.start("alice", "bot").unwrap();
    let second = sup.restart("alice", "bot").unwrap();
    assert_ne!(first.pid, second.pid);
    assert_eq!(sup.running_count(), 1);

    let log = read_log(&sup, "alice", "bot");
    assert!(log.contains(&format!("started pid={}", first.pid)));
    assert!(log.contains(&format!("stopped pid={}", first.pid)));
    assert!(log.contains(&format!("started pid={}", second.pid)));
}

#[test]
fn test_restart_of_idle_app_starts_it() {
    let root = TempDir::new().unwrap();
    let sup = supervisor(root.path(), 5);
    upload_script(&sup, "alice", "bot", LONG_RUNNING);

    sup.restart("alice", "bot").unwrap();
    assert!(sup.status("alice", "bot").unwrap().running);
}

#[test]
fn test_delete_stops_and_removes_everything() {
    let root = TempDir::new().unwrap();
    let sup = supervisor(root.path(), 5);
    upload_script(&sup, "alice", "bot", LONG_RUNNING);
    sup.start("alice", "bot").unwrap();

    sup.delete("alice", "bot").unwrap();
    assert_eq!(sup.running_count(), 0);

    let status = sup.status("alice", "bot").unwrap();
    assert_eq!(status.state, AppState::Deleted);
    assert_eq!(status.log_tail, "Waiting for logs...");

    let err = sup.start("alice", "bot").unwrap_err();
    assert!(matches!(err, SupervisorError::ArchiveNotFound(_)));
    assert!(sup.list_applications("alice").unwrap().is_empty());

    // Deleting again is fine
    sup.delete("alice", "bot").unwrap();
}

#[test]
fn test_stop_of_unknown_app_is_noop() {
    let root = TempDir::new().unwrap();
    let sup = supervisor(root.path(), 5);
    assert!(!sup.stop("alice", "nothing").unwrap());
}

#[test]
fn test_reupload_replaces_extracted_tree() {
    let root = TempDir::new().unwrap();
    let sup = supervisor(root.path(), 5);

    upload_script(&sup, "alice", "bot", "echo first\n");
    sup.start("alice", "bot").unwrap();
    assert!(wait_until(WAIT, || read_log(&sup, "alice", "bot").contains("first")));
    assert!(wait_until(WAIT, || !sup.status("alice", "bot").unwrap().running));

    upload_script(&sup, "alice", "bot", "echo second\n");
    assert_eq!(sup.status("alice", "bot").unwrap().state, AppState::Uploaded);

    sup.start("alice", "bot").unwrap();
    assert!(wait_until(WAIT, || read_log(&sup, "alice", "bot").contains("second")));
}

#[test]
fn test_list_applications_sorted_with_state() {
    let root = TempDir::new().unwrap();
    let sup = supervisor(root.path(), 5);
    upload_script(&sup, "alice", "zeta", LONG_RUNNING);
    upload_script(&sup, "alice", "alpha", LONG_RUNNING);
    upload_script(&sup, "bob", "other", LONG_RUNNING);
    sup.start("alice", "zeta").unwrap();

    let apps = sup.list_applications("alice").unwrap();
    let names: Vec<&str> = apps.iter().map(|app| app.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
    assert_eq!(apps[0].state, AppState::Uploaded);
    assert_eq!(apps[0].log_tail, "Waiting for logs...");
    assert_eq!(apps[1].state, AppState::Running);
    assert!(apps[1].running);
}

#[test]
fn test_upload_by_file_name() {
    let root = TempDir::new().unwrap();
    let sup = supervisor(root.path(), 5);
    let bytes = zip_bytes(&[("main.sh", LONG_RUNNING)]);

    let app = sup.upload_archive_file("alice", "bot.zip", &bytes).unwrap();
    assert_eq!(app.key.name, "bot");
    assert!(app.has_archive);

    let err = sup.upload_archive_file("alice", "bot.tar", &bytes).unwrap_err();
    assert!(matches!(err, SupervisorError::InvalidName { .. }));
}

#[test]
fn test_invalid_names_are_rejected() {
    let root = TempDir::new().unwrap();
    let sup = supervisor(root.path(), 5);

    for (tenant, name) in [("alice", "../escape"), ("..", "bot"), ("alice", ""), ("a/b", "bot")] {
        let err = sup.start(tenant, name).unwrap_err();
        assert!(
            matches!(err, SupervisorError::InvalidName { .. }),
            "{}/{} gave {:?}",
            tenant,
            name,
            err
        );
    }
}

#[test]
fn test_concurrent_starts_of_same_app_have_one_winner() {
    let root = TempDir::new().unwrap();
    let sup = Arc::new(supervisor(root.path(), 5));
    upload_script(&sup, "alice", "bot", LONG_RUNNING);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let sup = Arc::clone(&sup);
            std::thread::spawn(move || sup.start("alice", "bot"))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(result, SupervisorError::AlreadyRunning(_)), "{:?}", result);
    }
    assert_eq!(sup.running_count(), 1);
}

#[test]
fn test_shutdown_stops_everything() {
    let root = TempDir::new().unwrap();
    let sup = supervisor(root.path(), 5);
    for name in ["a", "b", "c"] {
        upload_script(&sup, "alice", name, LONG_RUNNING);
        sup.start("alice", name).unwrap();
    }

    assert_eq!(sup.shutdown(), 3);
    assert_eq!(sup.running_count(), 0);
}

#[test]
fn test_status_does_not_wait_on_inherited_output() {
    let root = TempDir::new().unwrap();
    let sup = supervisor(root.path(), 5);
    // The background sleep keeps the output pipe open after the script exits
    upload_script(&sup, "alice", "forker", "sleep 10 &\necho done\n");
    sup.start("alice", "forker").unwrap();

    let exited = wait_until(WAIT, || {
        let begin = Instant::now();
        let status = sup.status("alice", "forker").unwrap();
        assert!(begin.elapsed() < Duration::from_secs(1), "status blocked");
        !status.running
    });
    assert!(exited);

    let begin = Instant::now();
    sup.list_applications("alice").unwrap();
    assert!(begin.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_spawn_failure_is_logged() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), 5).with_launch(
        LaunchConfig::new("/nonexistent/interpreter").with_entrypoints(vec!["main.sh".to_string()]),
    );
    let sup = Supervisor::new(config);
    upload_script(&sup, "alice", "bot", LONG_RUNNING);

    let err = sup.start("alice", "bot").unwrap_err();
    assert!(matches!(err, SupervisorError::ProcessSpawnFailure(_)), "{:?}", err);
    assert_eq!(sup.running_count(), 0);

    let status = sup.status("alice", "bot").unwrap();
    assert!(!status.running);
    assert!(read_log(&sup, "alice", "bot").contains("start failed"));
}

#[test]
fn test_corrupt_upload_is_extraction_failure() {
    let root = TempDir::new().unwrap();
    let sup = supervisor(root.path(), 5);
    sup.upload_archive("alice", "broken", b"this is not a zip archive")
        .unwrap();

    let err = sup.start("alice", "broken").unwrap_err();
    assert!(matches!(err, SupervisorError::ExtractionFailure(_)), "{:?}", err);
    assert_eq!(sup.running_count(), 0);

    let status = sup.status("alice", "broken").unwrap();
    assert_eq!(status.state, AppState::Uploaded);
    assert!(status.log_tail.contains("start failed"));
}

#[test]
fn test_restart_logs_old_output_before_new_start() {
    let root = TempDir::new().unwrap();
    let sup = supervisor(root.path(), 5);
    let script = "trap 'echo goodbye; exit 0' TERM\necho hello\nwhile true; do sleep 0.1; done\n";
    upload_script(&sup, "alice", "polite", script);

    let first = sup.start("alice", "polite").unwrap();
    assert!(wait_until(WAIT, || read_log(&sup, "alice", "polite").contains("hello")));

    let second = sup.restart("alice", "polite").unwrap();
    let log = read_log(&sup, "alice", "polite");
    let goodbye = log.find("goodbye").expect("old process output is logged");
    let restarted = log
        .find(&format!("started pid={}", second.pid))
        .expect("new start marker is logged");
    assert!(goodbye < restarted);
    assert!(log.find(&format!("started pid={}", first.pid)).unwrap() < goodbye);

    sup.stop("alice", "polite").unwrap();
}

#[test]
fn test_stop_gives_up_after_grace_period() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path(), 5).with_stop_grace(Duration::from_millis(500));
    let sup = Supervisor::new(config);
    let script = "trap '' TERM\necho ready\nwhile true; do sleep 0.1; done\n";
    upload_script(&sup, "alice", "stubborn", script);

    let started = sup.start("alice", "stubborn").unwrap();
    assert!(wait_until(WAIT, || read_log(&sup, "alice", "stubborn").contains("ready")));

    let begin = Instant::now();
    assert!(sup.stop("alice", "stubborn").unwrap());
    let elapsed = begin.elapsed();
    assert!(elapsed >= Duration::from_millis(500), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "{:?}", elapsed);
    assert_eq!(sup.running_count(), 0);

    let log = read_log(&sup, "alice", "stubborn");
    assert!(log.contains("trailing output may interleave"));
    assert!(log.contains(&format!("stopped pid={}", started.pid)));

    let _ = kill(Pid::from_raw(started.pid as i32), Signal::SIGKILL);
}

#[test]
fn test_reupload_while_running_takes_effect_on_restart() {
    let root = TempDir::new().unwrap();
    let sup = supervisor(root.path(), 5);
    upload_script(&sup, "alice", "bot", LONG_RUNNING);
    let first = sup.start("alice", "bot").unwrap();

    upload_script(&sup, "alice", "bot", "echo second\nexec sleep 30\n");
    let status = sup.status("alice", "bot").unwrap();
    assert!(status.running);
    assert_eq!(status.pid, Some(first.pid));

    let second = sup.restart("alice", "bot").unwrap();
    assert_ne!(first.pid, second.pid);
    assert!(wait_until(WAIT, || read_log(&sup, "alice", "bot").contains("second")));
    sup.stop("alice", "bot").unwrap();
}
