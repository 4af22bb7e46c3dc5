//! Error types used by the mountvisor runtime, its tasks and its configuration.
//!
//! This module defines three enums:
//!
//! - [`ConfigError`]: bad configuration; fatal at startup, never retried.
//! - [`RuntimeError`]: errors raised by the supervisor itself.
//! - [`TaskError`]: errors raised by one attempt of a supervised task.
//!
//! All of them provide `as_label` for logs. Task errors never abort the process:
//! the owning task exits and the [`Supervisor`](crate::Supervisor) relaunches it.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// # Errors produced while loading and resolving configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A duration token was neither a bare integer nor `<int><s|m|h|d|w>`.
    #[error("invalid duration {token:?}: expected <int> or <int><s|m|h|d|w>")]
    InvalidDuration {
        /// The offending token.
        token: String,
    },

    /// A bandwidth schedule could not be parsed.
    #[error("invalid bandwidth schedule {spec:?}: {reason}")]
    InvalidSchedule {
        /// The full schedule text.
        spec: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The configuration sources could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// No home directory to expand default paths against.
    #[error("cannot determine the home directory for default paths")]
    NoHomeDir,
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::InvalidDuration { .. } => "config_invalid_duration",
            ConfigError::InvalidSchedule { .. } => "config_invalid_schedule",
            ConfigError::Load(_) => "config_load",
            ConfigError::NoHomeDir => "config_no_home_dir",
        }
    }
}

/// # Errors produced by the supervisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Termination signal handlers could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signal(#[from] std::io::Error),

    /// The overlay stayed empty for the whole retry budget.
    #[error("overlay still empty after {attempts} health-check retries")]
    OverlayEmpty {
        /// Number of retries that were spent.
        attempts: u32,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use mountvisor::RuntimeError;
    ///
    /// let err = RuntimeError::OverlayEmpty { attempts: 5 };
    /// assert_eq!(err.as_label(), "runtime_overlay_empty");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Signal(_) => "runtime_signal",
            RuntimeError::OverlayEmpty { .. } => "runtime_overlay_empty",
        }
    }
}

/// # Errors produced by one attempt of a supervised task.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// An external binary could not be started (missing, not executable, ...).
    #[error("failed to launch {program}: {error}")]
    Launch {
        /// Program that was being launched.
        program: String,
        /// The underlying error message.
        error: String,
    },

    /// The busy-probe itself failed; the mount point is treated as busy.
    #[error("busy state of {} is indeterminate: {error}", path.display())]
    ProbeIndeterminate {
        /// Mount point that was probed.
        path: PathBuf,
        /// The underlying error message.
        error: String,
    },

    /// The mount process exited unsuccessfully or died.
    #[error("mount of {} failed: {status}", mount_point.display())]
    MountFailed {
        /// Mount point the process was serving.
        mount_point: PathBuf,
        /// How the process ended.
        status: ExitStatus,
    },

    /// The move command exited unsuccessfully.
    #[error("move failed: {status}")]
    MoveFailed {
        /// How the process ended.
        status: ExitStatus,
    },

    /// Task was cancelled by the supervisor.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use mountvisor::TaskError;
    ///
    /// let err = TaskError::Launch { program: "rclone".into(), error: "not found".into() };
    /// assert_eq!(err.as_label(), "task_launch");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Launch { .. } => "task_launch",
            TaskError::ProbeIndeterminate { .. } => "task_probe_indeterminate",
            TaskError::MountFailed { .. } => "task_mount_failed",
            TaskError::MoveFailed { .. } => "task_move_failed",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Builds a [`TaskError::Launch`] from a spawn error.
    pub fn launch(program: impl Into<String>, err: &std::io::Error) -> Self {
        TaskError::Launch {
            program: program.into(),
            error: err.to_string(),
        }
    }
}
