//! Discovery worker thread
//!
//! Discovery is blocking, so passes run on a dedicated thread that talks to
//! the Tokio runtime through the registry bridge. Each `Scan` command runs
//! one pass; registered devices and the end-of-pass signal travel back as
//! events, the pass outcome through the command's response channel.

use crate::backend::UsbBackend;
use common::{DiscoveryCommand, DiscoveryWorker};
use std::io;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Discovery worker thread state
pub struct DiscoveryWorkerThread {
    backend: Box<dyn UsbBackend>,
    worker: DiscoveryWorker,
}

impl DiscoveryWorkerThread {
    pub fn new(backend: Box<dyn UsbBackend>, worker: DiscoveryWorker) -> Self {
        Self { backend, worker }
    }

    /// Serve commands until `Shutdown` or until the bridge is dropped
    pub fn run(mut self) {
        info!("Discovery worker started ({} backend)", self.backend.name());

        loop {
            match self.worker.recv_command() {
                Ok(DiscoveryCommand::Shutdown) => {
                    info!("Discovery worker shutting down");
                    break;
                }
                Ok(cmd) => self.handle_command(cmd),
                Err(e) => {
                    debug!("Command channel closed: {}", e);
                    break;
                }
            }
        }

        info!("Discovery worker stopped");
    }

    /// Handle a command, keeping the thread alive if the pass panics
    fn handle_command(&mut self, cmd: DiscoveryCommand) {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.handle_command_inner(cmd)
        }));

        if let Err(e) = result {
            error!("Panic in discovery command handler: {:?}", e);
        }
    }

    fn handle_command_inner(&mut self, cmd: DiscoveryCommand) {
        match cmd {
            DiscoveryCommand::Scan { response } => {
                debug!("Starting discovery pass");
                let outcome = self
                    .backend
                    .get_device_list(&mut self.worker)
                    .map_err(|e| {
                        error!("Discovery failed: {} ({})", e, e.backend_code());
                        e.to_string()
                    });
                let _ = response.send(outcome);
            }

            DiscoveryCommand::Shutdown => {
                // Handled by the run loop
            }
        }
    }
}

/// Spawn the worker on a named OS thread
pub fn spawn_discovery_worker(
    backend: Box<dyn UsbBackend>,
    worker: DiscoveryWorker,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("discovery-worker".to_string())
        .spawn(move || DiscoveryWorkerThread::new(backend, worker).run())
}
