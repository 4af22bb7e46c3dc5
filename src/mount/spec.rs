use std::fmt;
use std::path::{Path, PathBuf};

use crate::process::CommandSpec;

/// Which layer of the stack a mount belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Read-only cloud storage mount.
    Remote,
    /// Union of the writable cache over the remote mount.
    Overlay,
}

impl Role {
    /// Stable label, also used as the owning task's name.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Remote => "remote",
            Role::Overlay => "overlay",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of one mount.
///
/// `command` holds the program and fixed options; the source and the mount
/// point are appended, in that order, when the mount is launched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountSpec {
    /// Layer this mount belongs to.
    pub role: Role,
    /// Storage source, e.g. `GoogleDriveCrypt:` or `cache=RW:remote=RO`.
    pub source: String,
    /// Directory the mount appears at.
    pub mount_point: PathBuf,
    /// Program and fixed options.
    pub command: CommandSpec,
}

impl MountSpec {
    /// Creates a mount description.
    pub fn new(
        role: Role,
        source: impl Into<String>,
        mount_point: impl Into<PathBuf>,
        command: CommandSpec,
    ) -> Self {
        Self {
            role,
            source: source.into(),
            mount_point: mount_point.into(),
            command,
        }
    }

    /// Mount point as a path.
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Full invocation: fixed options, then source, then mount point.
    ///
    /// An empty source is omitted.
    pub fn mount_command(&self) -> CommandSpec {
        let cmd = self.command.clone();
        let cmd = if self.source.is_empty() {
            cmd
        } else {
            cmd.arg(self.source.clone())
        };
        cmd.path_arg(&self.mount_point)
    }
}
