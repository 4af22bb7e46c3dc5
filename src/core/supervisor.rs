//! # Supervisor: the control loop of the mount stack.
//!
//! The [`Supervisor`] owns the three task slots (remote, overlay, mover), the
//! overlay health check and the event fan-out. It is the only place that
//! starts, restarts or stops tasks.
//!
//! ## State machine
//! ```text
//!            ┌──────────────────────────────────────────────┐
//!            ▼                                              │
//!   Starting ──► Watching ──(health_interval)──► HealthCheck│
//!                  ▲  │                            │   │    │
//!                  │  │ poll: relaunch dead tasks  │   │ budget exhausted
//!                  │  └────────────────────────────┘   ▼    │
//!                  └────────── content found ────── Restarting
//!                                                   (terminate all, unmount overlay,
//!                                                    unmount remote)
//!   shutdown signal (any state) ──► Terminating ──► Stopped
//!                                   (terminate all, unmount overlay, unmount remote)
//! ```
//!
//! ## Event flow
//! ```text
//! Mounter / Mover / SupervisedTask / Supervisor ── publish(Event) ──► Bus
//!                                                                      │
//!                         Supervisor listener ◄────────────────────────┘
//!                                  └──► SubscriberSet::emit(&Event) ──► LogWriter, ...
//! ```
//!
//! ## Rules
//! - A task is never considered stopped before its attempt has been awaited.
//! - Teardown always unmounts the overlay before the remote.
//! - The shutdown future is only awaited; teardown runs after it resolves.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::config::SupervisorConfig;
use crate::core::health::{HealthCheck, HealthOutcome};
use crate::core::shutdown::ShutdownSignal;
use crate::core::stack::Stack;
use crate::core::supervised::{SupervisedTask, TaskState};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::mount::Mounter;
use crate::probe::MountProbe;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Supervisor state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SupervisorState {
    /// Launching every task of a new generation.
    Starting,
    /// Polling task liveness.
    Watching,
    /// Checking the overlay for content.
    HealthCheck,
    /// Cold restart after an unhealthy overlay.
    Restarting,
    /// Shutting down after a termination signal.
    Terminating,
    /// Everything stopped and released.
    Stopped,
}

impl SupervisorState {
    /// Stable label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            SupervisorState::Starting => "starting",
            SupervisorState::Watching => "watching",
            SupervisorState::HealthCheck => "health_check",
            SupervisorState::Restarting => "restarting",
            SupervisorState::Terminating => "terminating",
            SupervisorState::Stopped => "stopped",
        }
    }
}

/// Why the watch loop ended.
enum Exit {
    Restart(RuntimeError),
    Shutdown,
}

/// Control loop over the remote mount, the overlay mount and the mover.
pub struct Supervisor {
    cfg: SupervisorConfig,
    bus: Bus,
    stack: Stack,
    health: HealthCheck,
    subscribers: Vec<Arc<dyn Subscribe>>,
    state: watch::Sender<SupervisorState>,
}

impl Supervisor {
    /// Creates a supervisor. `bus` must be the bus the stack publishes on.
    pub fn new(
        cfg: SupervisorConfig,
        bus: Bus,
        stack: Stack,
        probe: Arc<dyn MountProbe>,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        let health = HealthCheck::new(
            probe,
            stack.overlay.spec().mount_point.clone(),
            cfg.max_overlay_retries,
            cfg.backoff,
            cfg.health_timeout,
            bus.clone(),
        );
        let (state, _) = watch::channel(SupervisorState::Starting);
        Self {
            cfg,
            bus,
            stack,
            health,
            subscribers,
            state,
        }
    }

    /// Event bus shared with the stack.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Current state.
    pub fn state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    /// Runs until `SIGINT`, `SIGTERM` or `SIGQUIT`, then tears everything down.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        let signal = ShutdownSignal::install()?;
        self.run_until(signal.recv()).await
    }

    /// Runs until `shutdown` resolves, then tears everything down.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), RuntimeError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let stop = CancellationToken::new();
        let trigger = stop.clone();
        let watcher = tokio::spawn(async move {
            shutdown.await;
            trigger.cancel();
        });
        let listener_done = CancellationToken::new();
        let listener = self.subscriber_listener(listener_done.clone());

        let mut slots = [
            SupervisedTask::new(self.stack.remote.clone()),
            SupervisedTask::new(self.stack.overlay.clone()),
            SupervisedTask::new(self.stack.mover.clone()),
        ];

        loop {
            self.set_state(SupervisorState::Starting);
            let generation = CancellationToken::new();
            for slot in slots.iter_mut() {
                slot.start(&generation, &self.bus);
            }

            match self.watch(&mut slots, &generation, &stop).await {
                Exit::Shutdown => break,
                Exit::Restart(err) => {
                    tracing::warn!(error = %err, label = err.as_label(), "restarting mount stack");
                    self.bus
                        .publish(Event::new(EventKind::RestartRequested).with_reason(err.to_string()));
                    self.set_state(SupervisorState::Restarting);
                    self.teardown(&mut slots).await;
                }
            }
        }

        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.set_state(SupervisorState::Terminating);
        self.teardown(&mut slots).await;
        self.bus.publish(Event::new(EventKind::AllStopped));
        self.set_state(SupervisorState::Stopped);

        watcher.abort();
        listener_done.cancel();
        let _ = listener.await;
        Ok(())
    }

    async fn watch(
        &self,
        slots: &mut [SupervisedTask],
        generation: &CancellationToken,
        stop: &CancellationToken,
    ) -> Exit {
        self.set_state(SupervisorState::Watching);
        let mut next_health = Instant::now() + self.cfg.health_interval;
        loop {
            tokio::select! {
                _ = stop.cancelled() => return Exit::Shutdown,
                _ = time::sleep(self.cfg.poll_interval) => {}
            }
            self.relaunch_dead(slots, generation);
            if Instant::now() < next_health {
                continue;
            }

            self.set_state(SupervisorState::HealthCheck);
            let outcome = self
                .health
                .run(stop, || self.relaunch_dead(slots, generation))
                .await;
            match outcome {
                HealthOutcome::Healthy => {
                    self.set_state(SupervisorState::Watching);
                    next_health = Instant::now() + self.cfg.health_interval;
                }
                HealthOutcome::Exhausted(err) => return Exit::Restart(err),
                HealthOutcome::Interrupted => return Exit::Shutdown,
            }
        }
    }

    /// Restarts every task whose attempt has ended.
    fn relaunch_dead(&self, slots: &mut [SupervisedTask], generation: &CancellationToken) {
        for slot in slots.iter_mut() {
            if slot.is_alive(&self.bus) {
                continue;
            }
            if slot.state() == TaskState::Terminated {
                self.bus
                    .publish(Event::new(EventKind::TaskDied).with_task(slot.name()));
            }
            slot.start(generation, &self.bus);
        }
    }

    /// Stops every task (mover, overlay, remote), then unmounts overlay and remote.
    async fn teardown(&self, slots: &mut [SupervisedTask]) {
        for slot in slots.iter_mut().rev() {
            slot.terminate().await;
        }
        self.release(&self.stack.overlay).await;
        self.release(&self.stack.remote).await;
    }

    async fn release(&self, mounter: &Mounter) {
        let mut ev = Event::new(EventKind::TeardownUnmount)
            .with_task(mounter.role().as_str())
            .with_mount_point(mounter.spec().mount_point());
        if let Err(e) = mounter.unmount().await {
            tracing::warn!(
                task = mounter.role().as_str(),
                error = %e,
                "could not release mount point"
            );
            ev = ev.with_reason(e.to_string());
        }
        self.bus.publish(ev);
    }

    fn set_state(&self, next: SupervisorState) {
        self.state.send_replace(next);
        self.bus
            .publish(Event::new(EventKind::StateChanged).with_reason(next.as_str()));
    }

    /// Forwards bus events to the subscriber set until `done`, then flushes it.
    fn subscriber_listener(&self, done: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let set = SubscriberSet::new(self.subscribers.clone(), self.bus.clone());
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit(&ev),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "subscriber listener lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = done.cancelled() => break,
                }
            }
            while let Ok(ev) = rx.try_recv() {
                set.emit(&ev);
            }
            set.shutdown().await;
        })
    }
}
