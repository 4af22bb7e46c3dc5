//! # Configuration loading and resolution.
//!
//! [`Config`] is the raw, serde-deserialized surface: every field has a
//! default, values come from an optional TOML file layered under
//! `MOUNTVISOR_*` environment variables. [`Config::resolve`] parses it once
//! (durations, bandwidth schedule, home-relative paths, host tool table) into
//! an immutable [`Settings`] that every component borrows from.
//!
//! # Example
//! ```
//! use std::path::Path;
//! use mountvisor::config::Config;
//! use mountvisor::platform::Platform;
//!
//! let settings = Config::default()
//!     .resolve_for(Path::new("/home/u"), Platform::Linux)
//!     .unwrap();
//!
//! assert_eq!(settings.remote_mount, Path::new("/home/u/mnt/GoogleDriveCrypt"));
//! assert_eq!(settings.schedule.period.as_secs(), 6 * 3600);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::SupervisorConfig;
use crate::duration::parse_duration;
use crate::error::ConfigError;
use crate::events::DEFAULT_CAPACITY;
use crate::mount::{MountSpec, MountTiming};
use crate::mover::Mover;
use crate::platform::{Capabilities, Platform};
use crate::policies::BackoffPolicy;
use crate::process::CommandSpec;
use crate::schedule::ScheduleSpec;

/// Environment variable prefix (`MOUNTVISOR_REMOTE`, `MOUNTVISOR_MOVE_PERIOD`, ...).
pub const ENV_PREFIX: &str = "MOUNTVISOR";

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_FILE: &str = "mountvisor";

/// Raw configuration as read from file and environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote store name as known to the storage client.
    pub remote: String,
    /// Remote mount point; defaults to `~/mnt/<remote>`.
    pub remote_mount: Option<String>,
    /// Overlay mount point.
    pub overlay_mount: String,
    /// Writable cache layer.
    pub cache_dir: String,
    /// Pause between mover runs (duration token).
    pub move_period: String,
    /// Bandwidth timetable, e.g. `07:00,1M 23:00,off`.
    pub bandwidth_schedule: String,
    /// Health-check retries before a full restart.
    pub max_overlay_retries: u32,
    /// Linear backoff step between health-check retries (duration token).
    pub health_backoff_step: String,
    /// Pause between two health checks (duration token).
    pub health_interval: String,
    /// Limit on one overlay listing during a health check (duration token).
    pub health_timeout: String,
    /// Task liveness poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Wait after launching the remote mount before signalling readiness.
    pub settle_delay: String,
    /// Wait after a busy probe before retrying.
    pub busy_retry: String,
    /// `SIGTERM` grace for external processes.
    pub terminate_grace: String,
    /// Cache paths never moved to the remote.
    pub move_excludes: Vec<String>,
    /// Storage client override.
    pub rclone: Option<String>,
    /// Union tool override.
    pub union: Option<String>,
    /// Inspection tool override.
    pub lsof: Option<String>,
    /// Unmount invocation override (argv, path appended).
    pub unmount: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote: "GoogleDriveCrypt".to_string(),
            remote_mount: None,
            overlay_mount: "~/mnt/union".to_string(),
            cache_dir: "~/mnt/cache".to_string(),
            move_period: "6h".to_string(),
            bandwidth_schedule: "07:00,1M 23:00,off".to_string(),
            max_overlay_retries: 5,
            health_backoff_step: "5s".to_string(),
            health_interval: "30s".to_string(),
            health_timeout: "10s".to_string(),
            poll_interval_ms: 1000,
            settle_delay: "3s".to_string(),
            busy_retry: "5s".to_string(),
            terminate_grace: "10s".to_string(),
            move_excludes: vec![".unionfs".to_string()],
            rclone: None,
            union: None,
            lsof: None,
            unmount: None,
        }
    }
}

impl Config {
    /// Loads configuration from `file` (or `./mountvisor.*` if present) and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let source = match file {
            Some(path) => config::File::from(path),
            None => config::File::with_name(DEFAULT_FILE).required(false),
        };
        let config = config::Config::builder()
            .add_source(source)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("move_excludes")
                    .with_list_parse_key("unmount"),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Resolves against the current user's home directory and host platform.
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        self.resolve_for(&home, Platform::current())
    }

    /// Resolves against an explicit home directory and platform.
    pub fn resolve_for(&self, home: &Path, platform: Platform) -> Result<Settings, ConfigError> {
        let mut tools = platform.capabilities(home);
        if let Some(rclone) = &self.rclone {
            tools.rclone = expand_home(rclone, home);
        }
        if let Some(union) = &self.union {
            tools.union = expand_home(union, home);
        }
        if let Some(lsof) = &self.lsof {
            tools.lsof = CommandSpec::new(expand_home(lsof, home));
        }
        if let Some(cmd) = self.unmount.as_deref().and_then(CommandSpec::from_argv) {
            tools.unmount = cmd;
        }

        let remote_mount = match &self.remote_mount {
            Some(path) => expand_home(path, home),
            None => home.join("mnt").join(&self.remote),
        };

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidDuration {
                token: "poll_interval_ms=0".to_string(),
            });
        }

        Ok(Settings {
            platform,
            remote: self.remote.clone(),
            remote_mount,
            overlay_mount: expand_home(&self.overlay_mount, home),
            cache_dir: expand_home(&self.cache_dir, home),
            schedule: ScheduleSpec::new(
                parse_duration(&self.move_period)?,
                &self.bandwidth_schedule,
            )?,
            max_overlay_retries: self.max_overlay_retries,
            backoff: BackoffPolicy::linear(parse_duration(&self.health_backoff_step)?),
            health_interval: parse_duration(&self.health_interval)?,
            health_timeout: parse_duration(&self.health_timeout)?,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            timing: MountTiming {
                settle_delay: parse_duration(&self.settle_delay)?,
                busy_retry: parse_duration(&self.busy_retry)?,
                terminate_grace: parse_duration(&self.terminate_grace)?,
            },
            move_excludes: self.move_excludes.clone(),
            tools,
        })
    }
}

/// Fully parsed, immutable runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Host family the tool table was taken from.
    pub platform: Platform,
    /// Remote store name.
    pub remote: String,
    /// Remote mount point.
    pub remote_mount: PathBuf,
    /// Overlay mount point.
    pub overlay_mount: PathBuf,
    /// Writable cache layer.
    pub cache_dir: PathBuf,
    /// Mover period and bandwidth windows.
    pub schedule: ScheduleSpec,
    /// Health-check retries before a full restart.
    pub max_overlay_retries: u32,
    /// Health-check retry backoff.
    pub backoff: BackoffPolicy,
    /// Pause between health checks.
    pub health_interval: Duration,
    /// Limit on one overlay listing.
    pub health_timeout: Duration,
    /// Task liveness poll interval.
    pub poll_interval: Duration,
    /// Mount cycle delays.
    pub timing: MountTiming,
    /// Cache paths never moved.
    pub move_excludes: Vec<String>,
    /// External tools.
    pub tools: Capabilities,
}

impl Settings {
    /// Remote mount description.
    pub fn remote_spec(&self) -> MountSpec {
        self.tools.remote_spec(&self.remote, &self.remote_mount)
    }

    /// Overlay mount description.
    pub fn overlay_spec(&self) -> MountSpec {
        self.tools
            .overlay_spec(&self.cache_dir, &self.remote_mount, &self.overlay_mount)
    }

    /// Move invocation without a bandwidth option.
    pub fn move_command(&self) -> CommandSpec {
        Mover::move_command(
            &self.tools.rclone,
            &self.remote,
            &self.cache_dir,
            &self.move_excludes,
        )
    }

    /// Control loop tuning.
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            poll_interval: self.poll_interval,
            health_interval: self.health_interval,
            health_timeout: self.health_timeout,
            max_overlay_retries: self.max_overlay_retries,
            backoff: self.backoff,
            bus_capacity: DEFAULT_CAPACITY,
        }
    }
}

fn expand_home(path: &str, home: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde_with_context(path, || Some(home.to_string_lossy())).as_ref())
}
