mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeProbe, Layout, Recorder};
use mountvisor::{
    BackoffPolicy, Bus, Event, EventKind, MountProbe, MountState, Subscribe, Supervisor,
    SupervisorConfig, SupervisorState,
};
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(10);

fn config(max_overlay_retries: u32) -> SupervisorConfig {
    SupervisorConfig {
        poll_interval: Duration::from_millis(20),
        health_interval: Duration::from_millis(150),
        max_overlay_retries,
        backoff: BackoffPolicy::linear(Duration::from_millis(10)),
        ..SupervisorConfig::default()
    }
}

struct Harness {
    layout: Layout,
    rec: Recorder,
    sup: Arc<Supervisor>,
    stop: CancellationToken,
    run: tokio::task::JoinHandle<Result<(), mountvisor::RuntimeError>>,
}

fn start(probe: Arc<FakeProbe>, max_overlay_retries: u32) -> Harness {
    start_with(probe, config(max_overlay_retries))
}

fn start_with(probe: Arc<FakeProbe>, cfg: SupervisorConfig) -> Harness {
    let layout = Layout::new();
    let bus = Bus::default();
    let rec = Recorder::attach(&bus);
    let probe: Arc<dyn MountProbe> = probe;
    let stack = layout.stack(Arc::clone(&probe), &bus);
    let subs: Vec<Arc<dyn Subscribe>> = Vec::new();
    let sup = Arc::new(Supervisor::new(
        cfg,
        bus,
        stack,
        probe,
        subs,
    ));

    let stop = CancellationToken::new();
    let run = tokio::spawn({
        let (sup, stop) = (Arc::clone(&sup), stop.clone());
        async move { sup.run_until(stop.cancelled_owned()).await }
    });
    Harness {
        layout,
        rec,
        sup,
        stop,
        run,
    }
}

fn teardown_targets(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter(|e| e.kind == EventKind::TeardownUnmount)
        .map(|e| e.task_name().to_string())
        .collect()
}

#[tokio::test]
async fn interrupt_tears_down_overlay_before_remote() {
    let h = start(FakeProbe::free(), 3);
    h.rec
        .wait_for(EventKind::MountLaunched, "overlay", 1, WAIT)
        .await;

    h.stop.cancel();
    tokio::time::timeout(WAIT, h.run).await.unwrap().unwrap().unwrap();
    h.rec.wait_stopped().await;

    let events = h.rec.events();
    assert_eq!(teardown_targets(&events), vec!["overlay", "remote"]);

    let overlay = events
        .iter()
        .find(|e| e.kind == EventKind::TeardownUnmount && e.task_name() == "overlay")
        .unwrap();
    assert_eq!(overlay.mount_point.as_deref(), Some(h.layout.overlay.as_path()));

    // Every task had fully exited before the first unmount.
    let first_unmount = overlay.seq;
    let stopped: Vec<_> = events
        .iter()
        .filter(|e| e.kind == EventKind::TaskStopped)
        .collect();
    assert_eq!(stopped.len(), 3);
    assert!(stopped.iter().all(|e| e.seq < first_unmount));

    assert_eq!(h.rec.count(EventKind::ShutdownRequested, ""), 1);
    assert_eq!(h.rec.count(EventKind::AllStopped, ""), 1);
    assert_eq!(h.sup.state(), SupervisorState::Stopped);
}

#[tokio::test]
async fn empty_overlay_triggers_exactly_one_full_restart() {
    // Initial check plus two retries come back empty; everything after has content.
    let probe = FakeProbe::empty_for(3);
    let h = start(probe, 2);

    h.rec
        .wait_for(EventKind::RestartRequested, "", 1, WAIT)
        .await;
    h.rec
        .wait_for(EventKind::HealthCheckPassed, "", 1, WAIT)
        .await;

    h.stop.cancel();
    tokio::time::timeout(WAIT, h.run).await.unwrap().unwrap().unwrap();
    h.rec.wait_stopped().await;

    assert_eq!(h.rec.count(EventKind::RestartRequested, ""), 1);
    for task in ["remote", "overlay", "mover"] {
        assert_eq!(
            h.rec.count(EventKind::TaskStarting, task),
            2,
            "{task} should be launched once per generation"
        );
    }
    assert_eq!(h.rec.count(EventKind::RetryScheduled, ""), 2);

    // Restart teardown and final teardown both release overlay first.
    let events = h.rec.events();
    assert_eq!(
        teardown_targets(&events),
        vec!["overlay", "remote", "overlay", "remote"]
    );

    let restart = h.rec.first(EventKind::RestartRequested, "").unwrap();
    let first_unmount = h.rec.first(EventKind::TeardownUnmount, "").unwrap();
    assert!(restart.seq < first_unmount.seq);
}

#[tokio::test]
async fn overlay_recovering_within_budget_avoids_restart() {
    let probe = FakeProbe::empty_for(2);
    let h = start(probe, 3);

    h.rec
        .wait_for(EventKind::OverlayRecovered, "", 1, WAIT)
        .await;
    h.stop.cancel();
    tokio::time::timeout(WAIT, h.run).await.unwrap().unwrap().unwrap();
    h.rec.wait_stopped().await;

    assert_eq!(h.rec.count(EventKind::RestartRequested, ""), 0);
    assert_eq!(h.rec.count(EventKind::TaskStarting, "remote"), 1);
    let recovered = h.rec.first(EventKind::OverlayRecovered, "").unwrap();
    assert_eq!(recovered.attempt, Some(2));
}

#[tokio::test]
async fn shutdown_is_not_blocked_by_a_hung_overlay_listing() {
    let h = start_with(
        FakeProbe::hung(),
        SupervisorConfig {
            health_timeout: Duration::from_secs(3600),
            ..config(3)
        },
    );
    let mut states = h.sup.watch_state();
    tokio::time::timeout(WAIT, states.wait_for(|s| *s == SupervisorState::HealthCheck))
        .await
        .unwrap()
        .unwrap();
    // The listing is stuck; the supervisor stays in the check.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.sup.state(), SupervisorState::HealthCheck);

    h.stop.cancel();
    tokio::time::timeout(Duration::from_secs(5), h.run)
        .await
        .expect("shutdown blocked by the health check")
        .unwrap()
        .unwrap();
    assert_eq!(h.sup.state(), SupervisorState::Stopped);
    assert_eq!(h.rec.count(EventKind::RestartRequested, ""), 0);
}

#[tokio::test]
async fn hung_overlay_listing_counts_as_empty() {
    let h = start_with(
        FakeProbe::hung(),
        SupervisorConfig {
            health_timeout: Duration::from_millis(30),
            ..config(1)
        },
    );
    h.rec
        .wait_for(EventKind::RestartRequested, "", 1, WAIT)
        .await;
    h.stop.cancel();
    tokio::time::timeout(WAIT, h.run).await.unwrap().unwrap().unwrap();
    h.rec.wait_stopped().await;

    // Initial check plus one retry, both timed out.
    let empty = h
        .rec
        .events()
        .iter()
        .filter(|e| e.kind == EventKind::OverlayEmpty)
        .take(2)
        .count();
    assert_eq!(empty, 2);
}

#[tokio::test]
async fn dead_task_is_relaunched() {
    let layout = Layout::new();
    let bus = Bus::default();
    let rec = Recorder::attach(&bus);
    let probe: Arc<dyn MountProbe> = FakeProbe::free();
    // The remote "mount" crashes shortly after settling.
    let crashing = mountvisor::CommandSpec::new("sh").args(["-c", "sleep 0.3; exit 1", "sh"]);
    let stack = layout.stack_with(crashing, common::sleeper("30"), Arc::clone(&probe), &bus);
    let sup = Arc::new(Supervisor::new(config(3), bus, stack, probe, Vec::new()));

    let stop = CancellationToken::new();
    let run = tokio::spawn({
        let (sup, stop) = (Arc::clone(&sup), stop.clone());
        async move { sup.run_until(stop.cancelled_owned()).await }
    });

    rec.wait_for(EventKind::TaskFailed, "remote", 1, WAIT).await;
    rec.wait_for(EventKind::TaskDied, "remote", 1, WAIT).await;
    rec.wait_for(EventKind::TaskStarting, "remote", 2, WAIT).await;

    let failed = rec.first(EventKind::TaskFailed, "remote").unwrap();
    assert!(failed.reason_text().starts_with("task_mount_failed"));
    // Self-healing never escalates to a full restart.
    assert_eq!(rec.count(EventKind::RestartRequested, ""), 0);
    assert_eq!(rec.count(EventKind::TaskStarting, "mover"), 1);

    stop.cancel();
    tokio::time::timeout(WAIT, run).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn mounters_are_stopped_after_shutdown() {
    let layout = Layout::new();
    let bus = Bus::default();
    let probe: Arc<dyn MountProbe> = FakeProbe::free();
    let stack = layout.stack(Arc::clone(&probe), &bus);
    let (remote, overlay) = (Arc::clone(&stack.remote), Arc::clone(&stack.overlay));
    let sup = Supervisor::new(config(3), bus.clone(), stack, probe, Vec::new());
    let rec = Recorder::attach(&bus);

    let stop = CancellationToken::new();
    let trigger = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        trigger.cancel();
    });
    tokio::time::timeout(WAIT, sup.run_until(stop.cancelled_owned()))
        .await
        .unwrap()
        .unwrap();
    rec.wait_stopped().await;

    assert_eq!(remote.state(), MountState::Stopped);
    assert_eq!(overlay.state(), MountState::Stopped);
    let states: Vec<String> = rec
        .events()
        .iter()
        .filter(|e| e.kind == EventKind::StateChanged)
        .map(|e| e.reason_text().to_string())
        .collect();
    assert_eq!(states.first().map(String::as_str), Some("starting"));
    assert_eq!(
        &states[states.len() - 2..],
        &["terminating".to_string(), "stopped".to_string()]
    );
}
