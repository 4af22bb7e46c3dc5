//! # Mount lifecycle loop.
//!
//! A [`Mounter`] owns exactly one mount point. Each cycle it releases any stale
//! mount, probes the point, launches the mount process and blocks until that
//! process exits. The remote mounter additionally waits a settle delay and
//! then signals readiness; the overlay mounter waits for that signal before
//! every cycle that follows a completed mount.
//!
//! A busy (or indeterminate) probe skips the attempt: the mounter waits
//! `busy_retry` and goes around again. It never mounts over a busy point.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time;
use tokio_util::sync::CancellationToken;

use super::readiness::{ReadinessReceiver, ReadinessSender, readiness_channel};
use super::spec::{MountSpec, Role};
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::probe::MountProbe;
use crate::process::{CommandSpec, ProcessHandle};
use crate::tasks::Task;

/// Where a mounter is in its cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountState {
    /// Not started, or (overlay) waiting for the remote to become ready.
    Idle,
    /// Releasing a stale mount.
    Unmounting,
    /// Checking whether the point is held open.
    ProbingBusy,
    /// Mount process launched, not yet considered established.
    Mounting,
    /// Mount process running.
    Mounted,
    /// Mount process exited cleanly, typically by daemonizing; the mount may
    /// still be live. The overlay stays here until the next readiness signal.
    Detached,
    /// Attempt finished.
    Stopped,
}

impl MountState {
    /// Stable label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            MountState::Idle => "idle",
            MountState::Unmounting => "unmounting",
            MountState::ProbingBusy => "probing_busy",
            MountState::Mounting => "mounting",
            MountState::Mounted => "mounted",
            MountState::Detached => "detached",
            MountState::Stopped => "stopped",
        }
    }
}

/// Delays used by the mount cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MountTiming {
    /// Time given to a freshly launched remote mount before readiness is signalled.
    pub settle_delay: Duration,
    /// Wait before retrying after a busy probe.
    pub busy_retry: Duration,
    /// `SIGTERM` grace period before the mount process is killed.
    pub terminate_grace: Duration,
}

impl Default for MountTiming {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(3),
            busy_retry: Duration::from_secs(5),
            terminate_grace: Duration::from_secs(10),
        }
    }
}

enum Handshake {
    Signal(ReadinessSender),
    Await(ReadinessReceiver),
}

/// Mount lifecycle task for one mount point.
pub struct Mounter {
    name: Arc<str>,
    spec: MountSpec,
    unmount: CommandSpec,
    probe: Arc<dyn MountProbe>,
    timing: MountTiming,
    handshake: Handshake,
    bus: Bus,
    state: watch::Sender<MountState>,
}

impl Mounter {
    /// Builds the remote and overlay mounters, connected by a readiness channel.
    ///
    /// `unmount` is the release command without the path argument.
    pub fn pair(
        remote: MountSpec,
        overlay: MountSpec,
        unmount: CommandSpec,
        probe: Arc<dyn MountProbe>,
        timing: MountTiming,
        bus: Bus,
    ) -> (Mounter, Mounter) {
        let (tx, rx) = readiness_channel();
        let remote = Mounter::new(
            remote,
            unmount.clone(),
            Arc::clone(&probe),
            timing,
            Handshake::Signal(tx),
            bus.clone(),
        );
        let overlay = Mounter::new(overlay, unmount, probe, timing, Handshake::Await(rx), bus);
        (remote, overlay)
    }

    fn new(
        spec: MountSpec,
        unmount: CommandSpec,
        probe: Arc<dyn MountProbe>,
        timing: MountTiming,
        handshake: Handshake,
        bus: Bus,
    ) -> Self {
        let (state, _) = watch::channel(MountState::Idle);
        Self {
            name: Arc::from(spec.role.as_str()),
            spec,
            unmount,
            probe,
            timing,
            handshake,
            bus,
            state,
        }
    }

    /// Layer this mounter serves.
    pub fn role(&self) -> Role {
        self.spec.role
    }

    /// Mount description.
    pub fn spec(&self) -> &MountSpec {
        &self.spec
    }

    /// Current state.
    pub fn state(&self) -> MountState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<MountState> {
        self.state.subscribe()
    }

    /// Full unmount invocation for this mount point.
    pub fn unmount_command(&self) -> CommandSpec {
        self.unmount.clone().path_arg(self.spec.mount_point())
    }

    /// Releases the mount point.
    ///
    /// Idempotent: a non-zero exit (usually "not mounted") is logged and ignored.
    /// Only a failure to launch the unmount tool is an error.
    pub async fn unmount(&self) -> Result<(), TaskError> {
        let out = self.unmount_command().run(&self.name).await?;
        if !out.status.success() {
            tracing::debug!(
                task = %self.name,
                mount_point = %self.spec.mount_point().display(),
                status = %out.status,
                "unmount reported failure; point was probably not mounted"
            );
        }
        Ok(())
    }

    async fn cycle(&self, ctx: &CancellationToken) -> Result<(), TaskError> {
        let mut armed = false;
        self.set_state(MountState::Idle);
        loop {
            if let Handshake::Await(rx) = &self.handshake {
                if !armed {
                    if self.state() != MountState::Detached {
                        self.set_state(MountState::Idle);
                    }
                    let ready = tokio::select! {
                        _ = ctx.cancelled() => return Ok(()),
                        ready = rx.wait() => ready,
                    };
                    if !ready {
                        // Remote side is gone; nothing will ever wake us.
                        ctx.cancelled().await;
                        return Ok(());
                    }
                    armed = true;
                }
            }
            if ctx.is_cancelled() {
                return Ok(());
            }

            self.set_state(MountState::Unmounting);
            self.unmount().await?;

            self.set_state(MountState::ProbingBusy);
            if let Some(reason) = self.busy_reason().await {
                tracing::warn!(
                    task = %self.name,
                    mount_point = %self.spec.mount_point().display(),
                    %reason,
                    "mount point busy; skipping mount attempt"
                );
                self.bus.publish(
                    self.event(EventKind::MountSkippedBusy)
                        .with_delay(self.timing.busy_retry)
                        .with_reason(reason),
                );
                if !pause(ctx, self.timing.busy_retry).await {
                    return Ok(());
                }
                continue;
            }

            self.set_state(MountState::Mounting);
            let command = self.spec.mount_command();
            let mut child = command.spawn(&self.name)?;
            self.bus
                .publish(self.event(EventKind::MountLaunched).with_reason(command.to_string()));

            if let Handshake::Signal(tx) = &self.handshake {
                let settled = tokio::select! {
                    _ = ctx.cancelled() => None,
                    status = child.wait() => Some(Some(status)),
                    _ = time::sleep(self.timing.settle_delay) => Some(None),
                };
                match settled {
                    None => {
                        self.stop(&mut child).await;
                        return Ok(());
                    }
                    Some(Some(status)) => {
                        let status =
                            status.map_err(|e| TaskError::launch(child.program(), &e))?;
                        if !status.success() {
                            return Err(self.failed(status));
                        }
                        tracing::warn!(
                            task = %self.name,
                            mount_point = %self.spec.mount_point().display(),
                            "mount process exited before settling; retrying"
                        );
                        if !pause(ctx, self.timing.busy_retry).await {
                            return Ok(());
                        }
                        continue;
                    }
                    Some(None) => {}
                }
                if tx.signal() {
                    self.bus.publish(self.event(EventKind::ReadinessSignaled));
                } else {
                    tracing::debug!(task = %self.name, "readiness already pending");
                }
            }

            self.set_state(MountState::Mounted);
            let exit = tokio::select! {
                _ = ctx.cancelled() => None,
                status = child.wait() => Some(status),
            };
            let Some(status) = exit else {
                self.stop(&mut child).await;
                return Ok(());
            };
            let status = status.map_err(|e| TaskError::launch(child.program(), &e))?;
            if !status.success() {
                return Err(self.failed(status));
            }
            tracing::info!(
                task = %self.name,
                mount_point = %self.spec.mount_point().display(),
                "mount process exited; cycling"
            );
            self.set_state(MountState::Detached);
            armed = false;
        }
    }

    async fn busy_reason(&self) -> Option<String> {
        match self.probe.is_busy(&self.name, self.spec.mount_point()).await {
            Ok(false) => None,
            Ok(true) => Some("open handles under mount point".to_string()),
            Err(e) => Some(e.to_string()),
        }
    }

    async fn stop(&self, child: &mut ProcessHandle) {
        match child.terminate(self.timing.terminate_grace).await {
            Ok(status) => {
                tracing::debug!(task = %self.name, %status, "mount process stopped")
            }
            Err(e) => {
                tracing::warn!(task = %self.name, error = %e, "failed to reap mount process")
            }
        }
    }

    fn failed(&self, status: std::process::ExitStatus) -> TaskError {
        TaskError::MountFailed {
            mount_point: self.spec.mount_point.clone(),
            status,
        }
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind)
            .with_task(Arc::clone(&self.name))
            .with_mount_point(self.spec.mount_point())
    }

    fn set_state(&self, next: MountState) {
        self.state.send_replace(next);
        self.bus
            .publish(self.event(EventKind::MountStateChanged).with_reason(next.as_str()));
    }
}

#[async_trait]
impl Task for Mounter {
    fn name(&self) -> &str {
        &self.name
    }

    /// Drops a readiness signal left over from the previous overlay attempt.
    fn prepare(&self) {
        if let Handshake::Await(rx) = &self.handshake {
            let stale = rx.drain();
            if stale > 0 {
                tracing::debug!(task = %self.name, stale, "discarded stale readiness signal");
            }
        }
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        let res = self.cycle(&ctx).await;
        self.set_state(MountState::Stopped);
        res
    }
}

/// Sleeps for `d`; `false` if cancelled first.
async fn pause(ctx: &CancellationToken, d: Duration) -> bool {
    tokio::select! {
        _ = ctx.cancelled() => false,
        _ = time::sleep(d) => true,
    }
}
