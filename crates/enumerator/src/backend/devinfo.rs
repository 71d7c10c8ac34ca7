//! Device-tree backend
//!
//! Discovery only: devices are found by walking `/dev/usb` and reading
//! device-tree properties. Opening devices, descriptors and transfers are
//! not available and answer with the trait defaults.

use super::UsbBackend;
use crate::config::DiscoverySettings;
use crate::devtree::DeviceTree;
use crate::discovery::Discovery;
use crate::error::DiscoveryError;
use crate::registry::DeviceRegistry;
use identity::PassSummary;
use tracing::debug;

pub struct DevInfoBackend<T: DeviceTree> {
    discovery: Discovery<T>,
}

impl<T: DeviceTree> DevInfoBackend<T> {
    pub fn new(settings: DiscoverySettings, tree: T) -> Self {
        Self {
            discovery: Discovery::new(settings, tree),
        }
    }
}

impl<T: DeviceTree + Send> UsbBackend for DevInfoBackend<T> {
    fn name(&self) -> &'static str {
        "devinfo"
    }

    fn get_device_list(
        &mut self,
        registry: &mut dyn DeviceRegistry,
    ) -> Result<PassSummary, DiscoveryError> {
        debug!(
            "enumerating {}",
            self.discovery.settings().dev_usb_root.display()
        );
        self.discovery.discover(registry)
    }
}
