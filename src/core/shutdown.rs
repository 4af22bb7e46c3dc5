//! # OS termination signals.
//!
//! [`ShutdownSignal::install`] registers the listeners up front, so a
//! registration failure surfaces at startup. Teardown only runs once
//! [`ShutdownSignal::recv`] completes, i.e. when a signal actually arrives.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal, used by systemd/launchd)
//! - `SIGQUIT` (quit signal)
//!
//! All three are handled identically: they trigger Terminating.

use std::io;

use tokio::signal::unix::{Signal, SignalKind, signal};

/// Installed termination listeners.
pub struct ShutdownSignal {
    sigint: Signal,
    sigterm: Signal,
    sigquit: Signal,
}

impl ShutdownSignal {
    /// Registers listeners for every termination signal.
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
            sigquit: signal(SignalKind::quit())?,
        })
    }

    /// Completes when any termination signal is received.
    pub async fn recv(mut self) {
        let name = tokio::select! {
            _ = self.sigint.recv()  => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigquit.recv() => "SIGQUIT",
        };
        tracing::info!(signal = name, "termination signal received");
    }
}
