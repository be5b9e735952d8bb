//! Signal handling for shutdown and manual recording toggles

use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::debug;

/// Process signals the daemon reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// SIGUSR1: toggle recording without the chord
    ToggleRecording,
    /// SIGTERM or SIGINT
    Shutdown,
}

/// Listens for SIGTERM, SIGINT and SIGUSR1
pub struct SignalListener {
    sigterm: Signal,
    sigint: Signal,
    sigusr1: Signal,
}

impl SignalListener {
    /// Register the signal handlers
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
            sigusr1: signal(SignalKind::user_defined1())?,
        })
    }

    /// Wait for the next signal
    pub async fn next(&mut self) -> LifecycleSignal {
        tokio::select! {
            _ = self.sigterm.recv() => {
                debug!("received SIGTERM");
                LifecycleSignal::Shutdown
            }
            _ = self.sigint.recv() => {
                debug!("received SIGINT");
                LifecycleSignal::Shutdown
            }
            _ = self.sigusr1.recv() => {
                debug!("received SIGUSR1");
                LifecycleSignal::ToggleRecording
            }
        }
    }
}
