/*!
 * Capacity Tests
 * Global bound on concurrently running applications
 */

use crate::support::{supervisor, upload_script, LONG_RUNNING};
use app_supervisor::SupervisorError;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_sixth_start_is_rejected() {
    let root = TempDir::new().unwrap();
    let sup = supervisor(root.path(), 5);
    for i in 0..6 {
        upload_script(&sup, "alice", &format!("app{}", i), LONG_RUNNING);
    }

    for i in 0..5 {
        sup.start("alice", &format!("app{}", i)).unwrap();
    }
    assert_eq!(sup.running_count(), 5);

    let err = sup.start("alice", "app5").unwrap_err();
    assert_eq!(err, SupervisorError::CapacityExceeded { limit: 5 });
    assert_eq!(sup.running_count(), 5);

    let status = sup.status("alice", "app5").unwrap();
    assert!(!status.running);
    assert!(status.log_tail.contains("start failed"));

    // Freeing a slot admits the waiting app
    assert!(sup.stop("alice", "app0").unwrap());
    sup.start("alice", "app5").unwrap();
    assert_eq!(sup.running_count(), 5);
}

#[test]
fn test_capacity_is_shared_across_tenants() {
    let root = TempDir::new().unwrap();
    let sup = supervisor(root.path(), 2);
    upload_script(&sup, "alice", "bot", LONG_RUNNING);
    upload_script(&sup, "bob", "bot", LONG_RUNNING);
    upload_script(&sup, "carol", "bot", LONG_RUNNING);

    sup.start("alice", "bot").unwrap();
    sup.start("bob", "bot").unwrap();
    let err = sup.start("carol", "bot").unwrap_err();
    assert_eq!(err, SupervisorError::CapacityExceeded { limit: 2 });
}

#[test]
fn test_concurrent_starts_never_exceed_capacity() {
    let root = TempDir::new().unwrap();
    let sup = Arc::new(supervisor(root.path(), 3));
    for i in 0..10 {
        upload_script(&sup, "alice", &format!("app{}", i), LONG_RUNNING);
    }

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let sup = Arc::clone(&sup);
            std::thread::spawn(move || sup.start("alice", &format!("app{}", i)))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let started = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(started, 3);
    assert_eq!(sup.running_count(), 3);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err, &SupervisorError::CapacityExceeded { limit: 3 });
    }
}
