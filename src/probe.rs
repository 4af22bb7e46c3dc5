//! Mount point inspection.
//!
//! [`MountProbe`] answers two questions about a mount point:
//! - is any process holding an open handle under it (`is_busy`)?
//! - does its directory listing have any entries (`has_content`)?
//!
//! The busy check fails safe: if the inspection tool cannot be run, the
//! result is [`TaskError::ProbeIndeterminate`] and callers must treat the
//! point as busy.

use std::path::Path;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::process::CommandSpec;

/// Inspection of a mount point's state.
#[async_trait]
pub trait MountProbe: Send + Sync + 'static {
    /// `Ok(true)` if a process holds an open handle under `path`.
    ///
    /// `task` names the caller; any tool output is logged under it.
    /// Returns [`TaskError::ProbeIndeterminate`] when this could not be determined.
    async fn is_busy(&self, task: &str, path: &Path) -> Result<bool, TaskError>;

    /// `true` if the directory listing at `path` is non-empty.
    ///
    /// Only meaningful as the overlay's health signal: an empty remote is legitimate.
    async fn has_content(&self, path: &Path) -> bool;
}

/// Probe backed by an `lsof`-style tool and a directory listing.
///
/// The tool is invoked as `<lsof> <path>`; exit code `1` means nothing is open
/// under the path, any other exit code means busy.
#[derive(Clone, Debug)]
pub struct LsofProbe {
    lsof: CommandSpec,
}

impl LsofProbe {
    /// Creates a probe from the inspection command (without the path argument).
    pub fn new(lsof: CommandSpec) -> Self {
        Self { lsof }
    }
}

#[async_trait]
impl MountProbe for LsofProbe {
    async fn is_busy(&self, task: &str, path: &Path) -> Result<bool, TaskError> {
        let indeterminate = |error: String| TaskError::ProbeIndeterminate {
            path: path.to_path_buf(),
            error,
        };

        let out = self
            .lsof
            .clone()
            .path_arg(path)
            .run(task)
            .await
            .map_err(|e| indeterminate(e.to_string()))?;

        match out.status.code() {
            Some(1) => Ok(false),
            Some(_) => Ok(true),
            None => Err(indeterminate(format!("probe terminated: {}", out.status))),
        }
    }

    async fn has_content(&self, path: &Path) -> bool {
        match tokio::fs::read_dir(path).await {
            Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "cannot list mount point");
                false
            }
        }
    }
}
