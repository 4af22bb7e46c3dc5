#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mountvisor::platform::Platform;
use mountvisor::schedule::ScheduleSpec;
use mountvisor::{
    Bus, CommandSpec, Event, EventKind, MountProbe, MountSpec, MountTiming, Mounter, Mover, Role,
    Stack, TaskError,
};
use tokio::sync::broadcast::error::RecvError;

/// In-memory probe: busy flag plus a count of empty listings to report.
#[derive(Default)]
pub struct FakeProbe {
    pub busy: AtomicBool,
    pub empty_checks_left: AtomicUsize,
    pub content_calls: AtomicUsize,
    /// Listings never complete, like a wedged FUSE mount.
    pub hung: AtomicBool,
}

impl FakeProbe {
    pub fn free() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn busy() -> Arc<Self> {
        let probe = Self::default();
        probe.busy.store(true, Ordering::SeqCst);
        Arc::new(probe)
    }

    pub fn hung() -> Arc<Self> {
        let probe = Self::default();
        probe.hung.store(true, Ordering::SeqCst);
        Arc::new(probe)
    }

    pub fn empty_for(checks: usize) -> Arc<Self> {
        let probe = Self::default();
        probe.empty_checks_left.store(checks, Ordering::SeqCst);
        Arc::new(probe)
    }
}

#[async_trait]
impl MountProbe for FakeProbe {
    async fn is_busy(&self, _task: &str, _path: &Path) -> Result<bool, TaskError> {
        Ok(self.busy.load(Ordering::SeqCst))
    }

    async fn has_content(&self, _path: &Path) -> bool {
        self.content_calls.fetch_add(1, Ordering::SeqCst);
        if self.hung.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.empty_checks_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
    }
}

/// Collects every event published on a bus.
#[derive(Clone)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn attach(bus: &Bus) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => sink.lock().unwrap().push(ev),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });
        Self { events }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, kind: EventKind, task: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind && (task.is_empty() || e.task_name() == task))
            .count()
    }

    pub fn first(&self, kind: EventKind, task: &str) -> Option<Event> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.kind == kind && (task.is_empty() || e.task_name() == task))
            .cloned()
    }

    /// Waits until the supervisor's final `stopped` state change has been recorded.
    pub async fn wait_stopped(&self) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let done = self
                .events
                .lock()
                .unwrap()
                .iter()
                .any(|e| e.kind == EventKind::StateChanged && e.reason_text() == "stopped");
            if done {
                return;
            }
            assert!(tokio::time::Instant::now() < deadline, "supervisor never reported stopped");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Polls until `count(kind, task) >= n`; panics after `within`.
    pub async fn wait_for(&self, kind: EventKind, task: &str, n: usize, within: Duration) {
        let deadline = tokio::time::Instant::now() + within;
        while self.count(kind, task) < n {
            if tokio::time::Instant::now() > deadline {
                panic!(
                    "timed out waiting for {n} x {kind:?} (task {task:?}), saw {}",
                    self.count(kind, task)
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// A "mount" that just stays up for `secs` seconds. The source and mount
/// point arguments land in `$1`/`$2` and are ignored.
pub fn sleeper(secs: &str) -> CommandSpec {
    CommandSpec::new("sh").args(["-c".to_string(), format!("sleep {secs}"), "sh".to_string()])
}

pub fn fast_timing() -> MountTiming {
    MountTiming {
        settle_delay: Duration::from_millis(50),
        busy_retry: Duration::from_millis(100),
        terminate_grace: Duration::from_secs(2),
    }
}

/// Directory layout of a throwaway stack.
pub struct Layout {
    pub _dir: tempfile::TempDir,
    pub remote: PathBuf,
    pub overlay: PathBuf,
    pub cache: PathBuf,
}

impl Layout {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let remote = dir.path().join("remote");
        let overlay = dir.path().join("union");
        let cache = dir.path().join("cache");
        for d in [&remote, &overlay, &cache] {
            std::fs::create_dir_all(d).unwrap();
        }
        Self {
            _dir: dir,
            remote,
            overlay,
            cache,
        }
    }

    pub fn remote_spec(&self, command: CommandSpec) -> MountSpec {
        MountSpec::new(Role::Remote, "", &self.remote, command)
    }

    /// Overlay spec with the real layer list and a harmless command.
    pub fn overlay_spec(&self, command: CommandSpec) -> MountSpec {
        let caps = Platform::Linux.capabilities(Path::new("/nonexistent-home"));
        let mut spec = caps.overlay_spec(&self.cache, &self.remote, &self.overlay);
        spec.command = command;
        spec
    }

    pub fn mounters(
        &self,
        remote: CommandSpec,
        overlay: CommandSpec,
        probe: Arc<dyn MountProbe>,
        bus: &Bus,
    ) -> (Mounter, Mounter) {
        Mounter::pair(
            self.remote_spec(remote),
            self.overlay_spec(overlay),
            CommandSpec::new("true"),
            probe,
            fast_timing(),
            bus.clone(),
        )
    }

    /// Long-running mounts and a mover that moves nothing.
    pub fn stack(&self, probe: Arc<dyn MountProbe>, bus: &Bus) -> Stack {
        self.stack_with(sleeper("30"), sleeper("30"), probe, bus)
    }

    pub fn stack_with(
        &self,
        remote: CommandSpec,
        overlay: CommandSpec,
        probe: Arc<dyn MountProbe>,
        bus: &Bus,
    ) -> Stack {
        let (remote, overlay) = self.mounters(remote, overlay, probe, bus);
        let mover = Mover::new(
            CommandSpec::new("true").current_dir(&self.cache),
            ScheduleSpec::new(Duration::from_secs(3600), "").unwrap(),
            Duration::from_secs(1),
            bus.clone(),
        );
        Stack {
            remote: Arc::new(remote),
            overlay: Arc::new(overlay),
            mover: Arc::new(mover),
        }
    }
}
