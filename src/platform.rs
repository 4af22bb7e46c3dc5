//! Host capability table.
//!
//! Everything that differs between hosts (tool locations, how to unmount) is
//! looked up here once at startup. The mount and move loops only ever see
//! the resolved [`MountSpec`]s and [`CommandSpec`]s.

use std::path::{Path, PathBuf};

use crate::mount::{MountSpec, Role};
use crate::process::CommandSpec;

/// Supported host families.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    /// Linux with unionfs-fuse.
    ///
    /// The overlay is a userspace union launched with its layers on the command
    /// line, the same shape as on macOS. A kernel overlay declared in fstab can be
    /// used instead by setting the `union` override to a wrapper that runs
    /// `sudo mount <point>`.
    Linux,
    /// macOS with osxfuse/macFUSE unionfs.
    MacOs,
}

impl Platform {
    /// Platform this binary was built for. Non-macOS unix hosts use the Linux table.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    /// Default tool locations; `home` anchors per-user installs.
    pub fn capabilities(self, home: &Path) -> Capabilities {
        match self {
            Platform::Linux => Capabilities {
                rclone: home.join("bin").join("rclone"),
                union: PathBuf::from("/usr/bin/unionfs"),
                lsof: CommandSpec::new("/usr/bin/lsof"),
                unmount: CommandSpec::new("/usr/bin/sudo").arg("/usr/bin/umount"),
            },
            Platform::MacOs => Capabilities {
                rclone: PathBuf::from("/usr/local/bin/rclone"),
                union: PathBuf::from("/usr/local/bin/unionfs"),
                lsof: CommandSpec::new("/usr/sbin/lsof"),
                unmount: CommandSpec::new("/usr/sbin/diskutil").arg("unmount"),
            },
        }
    }
}

/// Resolved external tools.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Storage client used for both mounting and moving.
    pub rclone: PathBuf,
    /// Union filesystem tool.
    pub union: PathBuf,
    /// Open-handle inspection tool; the path is appended.
    pub lsof: CommandSpec,
    /// Unmount invocation; the path is appended.
    pub unmount: CommandSpec,
}

impl Capabilities {
    /// Read-only remote mount of `remote` at `mount_point`.
    pub fn remote_spec(&self, remote: &str, mount_point: &Path) -> MountSpec {
        let command = CommandSpec::new(&self.rclone).args([
            "mount",
            "--read-only",
            "--allow-other",
            "--no-modtime",
            "--dir-cache-time=240m",
            "--tpslimit=10",
            "--tpslimit-burst=1",
            "--buffer-size=1G",
        ]);
        MountSpec::new(Role::Remote, format!("{remote}:"), mount_point, command)
    }

    /// Copy-on-write union of `cache` (writable) over `remote_mount` (read-only).
    pub fn overlay_spec(&self, cache: &Path, remote_mount: &Path, mount_point: &Path) -> MountSpec {
        let command = CommandSpec::new(&self.union).args(["-o", "cow,direct_io,auto_cache"]);
        let layers = format!("{}=RW:{}=RO", cache.display(), remote_mount.display());
        MountSpec::new(Role::Overlay, layers, mount_point, command)
    }
}
