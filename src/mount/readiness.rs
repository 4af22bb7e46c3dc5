//! # Readiness handshake between the remote and overlay mounters.
//!
//! A single-slot, one-directional channel. The remote mounter signals once
//! its mount has settled; the overlay mounter waits for a signal before each
//! mount attempt. A signal left unread when the overlay task restarts is
//! stale and gets drained, so a new overlay generation only ever reacts to a
//! signal emitted after it started.

use tokio::sync::{Mutex, mpsc};

/// Creates a connected sender/receiver pair.
pub fn readiness_channel() -> (ReadinessSender, ReadinessReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (
        ReadinessSender { tx },
        ReadinessReceiver { rx: Mutex::new(rx) },
    )
}

/// Remote side of the handshake.
#[derive(Clone, Debug)]
pub struct ReadinessSender {
    tx: mpsc::Sender<()>,
}

impl ReadinessSender {
    /// Signals that the remote mount is ready to be overlaid.
    ///
    /// Never blocks. Returns `false` if a signal was already pending (it is
    /// not duplicated) or the receiver is gone.
    pub fn signal(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}

/// Overlay side of the handshake.
#[derive(Debug)]
pub struct ReadinessReceiver {
    rx: Mutex<mpsc::Receiver<()>>,
}

impl ReadinessReceiver {
    /// Waits for the next signal.
    ///
    /// Returns `false` once every sender has been dropped. Cancel-safe.
    pub async fn wait(&self) -> bool {
        self.rx.lock().await.recv().await.is_some()
    }

    /// Discards any pending signal without blocking; returns how many were dropped.
    ///
    /// If a waiter currently holds the channel nothing is drained: that waiter
    /// belongs to the live generation.
    pub fn drain(&self) -> usize {
        let Ok(mut rx) = self.rx.try_lock() else {
            return 0;
        };
        let mut drained = 0;
        while rx.try_recv().is_ok() {
            drained += 1;
        }
        drained
    }
}
