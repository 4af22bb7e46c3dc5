//! Cache migration: periodically moves everything written to the local cache
//! up to remote storage.
//!
//! Each run is a single `rclone move` executed from inside the cache
//! directory, so it can only ever touch cache content. The bandwidth limit is
//! picked from the schedule at launch time. A failed run is logged and the
//! next period retries; only a failure to launch the tool ends the attempt.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveTime};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::process::CommandSpec;
use crate::schedule::ScheduleSpec;
use crate::tasks::Task;

/// Periodic cache-to-remote mover.
pub struct Mover {
    name: Arc<str>,
    base: CommandSpec,
    schedule: ScheduleSpec,
    terminate_grace: std::time::Duration,
    bus: Bus,
}

impl Mover {
    /// Creates a mover.
    ///
    /// `base` is the move invocation without any bandwidth option; it must
    /// already carry the cache directory as its working directory.
    pub fn new(
        base: CommandSpec,
        schedule: ScheduleSpec,
        terminate_grace: std::time::Duration,
        bus: Bus,
    ) -> Self {
        Self {
            name: Arc::from("mover"),
            base,
            schedule,
            terminate_grace,
            bus,
        }
    }

    /// Builds the standard move invocation:
    /// `<rclone> move . <remote>: --exclude=<x>...`, run from `cache_dir`.
    pub fn move_command(
        rclone: impl Into<PathBuf>,
        remote: &str,
        cache_dir: impl Into<PathBuf>,
        excludes: &[String],
    ) -> CommandSpec {
        CommandSpec::new(rclone)
            .arg("move")
            .arg(".")
            .arg(format!("{remote}:"))
            .args(excludes.iter().map(|x| format!("--exclude={x}")))
            .current_dir(cache_dir)
    }

    /// The schedule this mover follows.
    pub fn schedule(&self) -> &ScheduleSpec {
        &self.schedule
    }

    /// Invocation to use for a run starting at `now`.
    pub fn command_at(&self, now: NaiveTime) -> CommandSpec {
        match self.schedule.limit_at(now) {
            Some(rate) => self.base.clone().arg(format!("--bwlimit={rate}")),
            None => self.base.clone(),
        }
    }

    /// Runs one move to completion. `Ok(false)` means the run was cancelled.
    async fn move_once(&self, ctx: &CancellationToken) -> Result<bool, TaskError> {
        let now = Local::now().time();
        let limit = self.schedule.limit_at(now).unwrap_or("off").to_string();
        let command = self.command_at(now);

        self.bus.publish(
            Event::new(EventKind::MoveStarted)
                .with_task(Arc::clone(&self.name))
                .with_reason(limit),
        );
        let mut child = command.spawn(&self.name)?;

        let exit = tokio::select! {
            _ = ctx.cancelled() => None,
            status = child.wait() => Some(status),
        };
        let Some(status) = exit else {
            if let Err(e) = child.terminate(self.terminate_grace).await {
                tracing::warn!(task = %self.name, error = %e, "failed to reap move process");
            }
            return Ok(false);
        };
        let status = status.map_err(|e| TaskError::launch(child.program(), &e))?;

        if status.success() {
            self.bus
                .publish(Event::new(EventKind::MoveCompleted).with_task(Arc::clone(&self.name)));
        } else {
            let err = TaskError::MoveFailed { status };
            self.bus.publish(
                Event::new(EventKind::MoveFailed)
                    .with_task(Arc::clone(&self.name))
                    .with_reason(err.to_string()),
            );
        }
        Ok(true)
    }
}

#[async_trait]
impl Task for Mover {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
        loop {
            if !self.move_once(&ctx).await? {
                return Ok(());
            }
            tokio::select! {
                _ = ctx.cancelled() => return Ok(()),
                _ = time::sleep(self.schedule.period) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn mover(base: CommandSpec, period: Duration) -> Mover {
        let schedule = ScheduleSpec::new(period, "07:00,1M 23:00,off").unwrap();
        Mover::new(base, schedule, Duration::from_secs(1), Bus::default())
    }

    #[test]
    fn move_command_runs_from_cache_and_skips_excludes() {
        let cmd = Mover::move_command(
            "/bin/rclone",
            "Drive",
            "/home/u/mnt/cache",
            &[".unionfs".to_string()],
        );
        assert_eq!(cmd.to_string(), "/bin/rclone move . Drive: --exclude=.unionfs");
        assert_eq!(cmd.cwd, Some(PathBuf::from("/home/u/mnt/cache")));
    }

    #[test]
    fn bandwidth_follows_time_of_day() {
        let m = mover(CommandSpec::new("rclone").arg("move"), Duration::from_secs(60));
        assert_eq!(m.command_at(at(12, 0)).to_string(), "rclone move --bwlimit=1M");
        assert_eq!(m.command_at(at(23, 30)).to_string(), "rclone move");
        assert_eq!(m.command_at(at(3, 0)).to_string(), "rclone move");
    }

    #[tokio::test]
    async fn failed_run_is_reported_and_loop_continues() {
        let m = mover(CommandSpec::new("false"), Duration::from_millis(20));
        let mut rx = m.bus.subscribe();
        let ctx = CancellationToken::new();
        let stopper = ctx.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(200)).await;
            stopper.cancel();
        });
        m.run(ctx).await.unwrap();

        let mut failures = 0;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::MoveFailed {
                failures += 1;
            }
        }
        assert!(failures >= 2, "expected repeated runs, saw {failures} failures");
    }

    #[tokio::test]
    async fn missing_tool_ends_the_attempt() {
        let m = mover(CommandSpec::new("/nonexistent/rclone"), Duration::from_secs(60));
        let err = m.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TaskError::Launch { .. }));
    }

    #[tokio::test]
    async fn cancel_terminates_in_flight_move() {
        let m = mover(CommandSpec::new("sleep").arg("30"), Duration::from_secs(60));
        let ctx = CancellationToken::new();
        let stopper = ctx.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(100)).await;
            stopper.cancel();
        });
        time::timeout(Duration::from_secs(5), m.run(ctx))
            .await
            .expect("mover should stop promptly")
            .unwrap();
    }
}
