//! Tests for restart detection of control-plane containers.

mod common;

use common::{probe_failure, running, starting, CountingProgress, ScriptedProbe};
use converge::{ComponentIdentity, ConvergenceError, LifecycleState, RestartWatcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const INTERVAL: Duration = Duration::from_secs(10);

fn watcher(probe: Arc<ScriptedProbe>) -> RestartWatcher {
    RestartWatcher::new(probe, Arc::new(CountingProgress::default()), INTERVAL)
}

fn exited(name: &str, id: &str) -> Result<ComponentIdentity, converge::ProbeError> {
    Ok(ComponentIdentity::new(
        name,
        Some(id.to_string()),
        LifecycleState::Failed,
    ))
}

#[tokio::test(start_paused = true)]
async fn test_restart_detected_on_third_probe() {
    let probe = Arc::new(ScriptedProbe::new().with_snapshots(
        "etcd",
        vec![
            exited("etcd", "abc123"),
            starting("etcd", "xyz789"),
            running("etcd", "xyz789"),
        ],
    ));
    let start = Instant::now();

    let identity = watcher(probe.clone())
        .wait_for_restart("etcd", "abc123", Duration::from_secs(900))
        .await
        .expect("restart should be detected");

    assert_eq!(identity.instance_id.as_deref(), Some("xyz789"));
    assert_eq!(identity.state, LifecycleState::Running);
    assert_eq!(probe.snapshot_calls(), 3);
    assert_eq!(Instant::now().duration_since(start), Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_identity_is_never_a_restart() {
    let probe = Arc::new(
        ScriptedProbe::new().with_snapshots("etcd", vec![running("etcd", "abc123")]),
    );

    let err = watcher(probe)
        .wait_for_restart("etcd", "abc123", Duration::from_secs(60))
        .await
        .expect_err("same id while running must not count as restarted");

    match err {
        ConvergenceError::NotRunning {
            name,
            prior,
            observed_id,
            observed_state,
        } => {
            assert_eq!(name, "etcd");
            assert_eq!(prior, "abc123");
            assert_eq!(observed_id.as_deref(), Some("abc123"));
            assert_eq!(observed_state, LifecycleState::Running);
        }
        other => panic!("expected NotRunning, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_new_identity_not_running_times_out() {
    let probe = Arc::new(
        ScriptedProbe::new().with_snapshots("kube-apiserver", vec![starting("kube-apiserver", "new-1")]),
    );

    let err = watcher(probe)
        .wait_for_restart("kube-apiserver", "old-1", Duration::from_secs(60))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ConvergenceError::NotRunning {
            observed_state: LifecycleState::Starting,
            ..
        }
    ));
    assert_eq!(err.component(), "kube-apiserver");
    assert!(!err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn test_absent_container_keeps_waiting() {
    let probe = Arc::new(ScriptedProbe::new().with_snapshots(
        "etcd",
        vec![
            Ok(ComponentIdentity::absent("etcd")),
            Ok(ComponentIdentity::absent("etcd")),
            running("etcd", "fresh"),
        ],
    ));

    let identity = watcher(probe.clone())
        .wait_for_restart("etcd", "stale", Duration::from_secs(300))
        .await
        .unwrap();

    assert_eq!(identity.instance_id.as_deref(), Some("fresh"));
    assert_eq!(probe.snapshot_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_probe_failures_are_retried() {
    let probe = Arc::new(ScriptedProbe::new().with_snapshots(
        "kube-scheduler",
        vec![
            Err(probe_failure()),
            Err(probe_failure()),
            Err(probe_failure()),
            running("kube-scheduler", "s2"),
        ],
    ));

    let result = watcher(probe.clone())
        .wait_for_restart("kube-scheduler", "s1", Duration::from_secs(900))
        .await;

    assert!(result.is_ok());
    assert_eq!(probe.snapshot_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_polls_nothing_after_deadline() {
    let probe = Arc::new(
        ScriptedProbe::new().with_snapshots("etcd", vec![exited("etcd", "abc123")]),
    );
    let start = Instant::now();

    let result = watcher(probe.clone())
        .wait_for_restart("etcd", "abc123", Duration::from_secs(30))
        .await;

    assert!(result.is_err());
    // Polls at 0s, 10s, 20s plus the single final check at the deadline
    let offsets: Vec<u64> = probe
        .snapshot_times()
        .iter()
        .map(|t| t.duration_since(start).as_secs())
        .collect();
    assert_eq!(offsets, vec![0, 10, 20, 30]);
}

#[tokio::test(start_paused = true)]
async fn test_empty_prior_accepts_any_running_instance() {
    let probe = Arc::new(
        ScriptedProbe::new().with_snapshots("etcd", vec![running("etcd", "anything")]),
    );

    let identity = watcher(probe)
        .wait_for_restart("etcd", "", Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(identity.instance_id_or_empty(), "anything");
}

#[tokio::test]
async fn test_capture_identity_reads_current_snapshot() {
    let probe = Arc::new(
        ScriptedProbe::new().with_snapshots("etcd", vec![running("etcd", "abc123")]),
    );

    let identity = watcher(probe).capture_identity("etcd").await.unwrap();

    assert_eq!(identity.name, "etcd");
    assert_eq!(identity.instance_id.as_deref(), Some("abc123"));
}

#[test]
fn test_restart_predicate_requires_all_conditions() {
    let same = ComponentIdentity::new("etcd", Some("a".into()), LifecycleState::Running);
    let new_not_running = ComponentIdentity::new("etcd", Some("b".into()), LifecycleState::Starting);
    let new_running = ComponentIdentity::new("etcd", Some("b".into()), LifecycleState::Running);
    let empty = ComponentIdentity::new("etcd", Some(String::new()), LifecycleState::Running);

    assert!(!same.is_restarted_from("a"));
    assert!(!new_not_running.is_restarted_from("a"));
    assert!(new_running.is_restarted_from("a"));
    assert!(!empty.is_restarted_from("a"));
    assert_eq!(empty.instance_id, None);
}
