//! Async channel bridge between Tokio runtime and the discovery thread
//!
//! A discovery pass is blocking, so it runs on its own OS thread. The Tokio
//! side asks for passes with [`DiscoveryCommand`] and reads the devices the
//! pass registers as [`DiscoveryEvent`]s.

use async_channel::{Receiver, Sender, bounded};
use identity::{DeviceIdentity, PassSummary};

/// Result of one requested pass
///
/// `Err` carries the message of a fatal discovery error; per-device
/// failures never show up here.
pub type ScanOutcome = std::result::Result<PassSummary, String>;

/// Commands from Tokio runtime to the discovery thread
#[derive(Debug)]
pub enum DiscoveryCommand {
    /// Run one discovery pass
    Scan {
        /// Channel to send the pass outcome back
        response: tokio::sync::oneshot::Sender<ScanOutcome>,
    },

    /// Shutdown the discovery thread gracefully
    Shutdown,
}

/// Events from the discovery thread
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// A device identity was registered during the current pass
    DeviceFound(DeviceIdentity),

    /// The current pass ended; no more devices follow for it
    PassComplete(PassSummary),
}

/// Handle for Tokio runtime (async)
#[derive(Clone)]
pub struct RegistryBridge {
    cmd_tx: Sender<DiscoveryCommand>,
    event_rx: Receiver<DiscoveryEvent>,
}

impl RegistryBridge {
    /// Send a command to the discovery thread
    pub async fn send_command(&self, cmd: DiscoveryCommand) -> crate::Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Receive an event from the discovery thread
    pub async fn recv_event(&self) -> crate::Result<DiscoveryEvent> {
        self.event_rx
            .recv()
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Try to receive an event without waiting
    pub fn try_recv_event(&self) -> Option<DiscoveryEvent> {
        self.event_rx.try_recv().ok()
    }
}

/// Handle for the discovery thread (blocking)
pub struct DiscoveryWorker {
    cmd_rx: Receiver<DiscoveryCommand>,
    event_tx: Sender<DiscoveryEvent>,
}

impl DiscoveryWorker {
    /// Receive a command from Tokio runtime (blocking)
    pub fn recv_command(&self) -> crate::Result<DiscoveryCommand> {
        self.cmd_rx
            .recv_blocking()
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Try to receive a command without blocking
    pub fn try_recv_command(&self) -> Option<DiscoveryCommand> {
        self.cmd_rx.try_recv().ok()
    }

    /// Send an event to Tokio runtime (blocking)
    pub fn send_event(&self, event: DiscoveryEvent) -> crate::Result<()> {
        self.event_tx
            .send_blocking(event)
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Create the channel bridge between Tokio and the discovery thread
///
/// Returns (RegistryBridge for Tokio, DiscoveryWorker for the discovery thread)
pub fn create_registry_bridge() -> (RegistryBridge, DiscoveryWorker) {
    let (cmd_tx, cmd_rx) = bounded(16);
    let (event_tx, event_rx) = bounded(256);

    (
        RegistryBridge { cmd_tx, event_rx },
        DiscoveryWorker { cmd_rx, event_tx },
    )
}
