//! Downstream consumers of discovered identities

use common::{DiscoveryEvent, DiscoveryWorker};
use identity::{DeviceIdentity, PassSummary};
use tracing::error;

/// Receiver of the identities produced by a discovery pass
///
/// Ownership of each identity moves to the registry; discovery keeps no
/// reference to it afterwards.
pub trait DeviceRegistry {
    fn register(&mut self, identity: DeviceIdentity);

    /// Called once when a pass completes
    fn end_of_pass(&mut self, summary: &PassSummary);
}

/// In-memory registry
#[derive(Debug, Default)]
pub struct CollectingRegistry {
    devices: Vec<DeviceIdentity>,
    passes: Vec<PassSummary>,
}

impl CollectingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identities registered so far, in discovery order
    pub fn devices(&self) -> &[DeviceIdentity] {
        &self.devices
    }

    /// Summaries of completed passes
    pub fn passes(&self) -> &[PassSummary] {
        &self.passes
    }
}

impl DeviceRegistry for CollectingRegistry {
    fn register(&mut self, identity: DeviceIdentity) {
        self.devices.push(identity);
    }

    fn end_of_pass(&mut self, summary: &PassSummary) {
        self.passes.push(*summary);
    }
}

/// Forwards identities across the channel bridge
impl DeviceRegistry for DiscoveryWorker {
    fn register(&mut self, identity: DeviceIdentity) {
        let session_id = identity.session_id();
        if let Err(e) = self.send_event(DiscoveryEvent::DeviceFound(identity)) {
            error!("Failed to forward device {}: {}", session_id, e);
        }
    }

    fn end_of_pass(&mut self, summary: &PassSummary) {
        if let Err(e) = self.send_event(DiscoveryEvent::PassComplete(*summary)) {
            error!("Failed to forward end of pass: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use identity::{DeviceSpeed, NodePath};

    fn identity(addr: u8) -> DeviceIdentity {
        let node = NodePath::new(format!("/pci@0,0/device@{}", addr)).unwrap();
        DeviceIdentity::new(1, addr, 1, DeviceSpeed::Full, node)
    }

    #[test]
    fn test_collecting_registry_keeps_order() {
        let mut registry = CollectingRegistry::new();
        registry.register(identity(3));
        registry.register(identity(1));
        registry.end_of_pass(&PassSummary {
            devices: 2,
            ..Default::default()
        });

        let addrs: Vec<u8> = registry.devices().iter().map(|d| d.device_address()).collect();
        assert_eq!(addrs, vec![3, 1]);
        assert_eq!(registry.passes().len(), 1);
        assert_eq!(registry.passes()[0].devices, 2);
    }

    #[test]
    fn test_worker_registry_forwards_events() {
        let (bridge, mut worker) = common::create_registry_bridge();

        worker.register(identity(9));
        worker.end_of_pass(&PassSummary::default());

        assert!(matches!(
            bridge.try_recv_event(),
            Some(DiscoveryEvent::DeviceFound(d)) if d.device_address() == 9
        ));
        assert!(matches!(
            bridge.try_recv_event(),
            Some(DiscoveryEvent::PassComplete(_))
        ));
    }
}
