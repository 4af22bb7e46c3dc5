use std::sync::Arc;

use crate::config::Settings;
use crate::events::Bus;
use crate::mount::Mounter;
use crate::mover::Mover;
use crate::probe::MountProbe;
use crate::tasks::TaskRef;

/// The three supervised tasks.
///
/// The mounters are kept concrete because teardown also needs them to
/// release their mount points after their tasks have exited.
pub struct Stack {
    /// Remote mount loop; signals readiness.
    pub remote: Arc<Mounter>,
    /// Overlay mount loop; waits for readiness.
    pub overlay: Arc<Mounter>,
    /// Cache migration loop.
    pub mover: TaskRef,
}

impl Stack {
    /// Wires the standard stack from resolved settings.
    pub fn from_settings(settings: &Settings, probe: Arc<dyn MountProbe>, bus: &Bus) -> Self {
        let (remote, overlay) = Mounter::pair(
            settings.remote_spec(),
            settings.overlay_spec(),
            settings.tools.unmount.clone(),
            probe,
            settings.timing,
            bus.clone(),
        );
        let mover = Mover::new(
            settings.move_command(),
            settings.schedule.clone(),
            settings.timing.terminate_grace,
            bus.clone(),
        );
        Self {
            remote: Arc::new(remote),
            overlay: Arc::new(overlay),
            mover: Arc::new(mover),
        }
    }
}
