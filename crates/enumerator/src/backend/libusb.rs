//! Portable libusb backend
//!
//! Enumerates through `rusb` and derives the same identities as the
//! device-tree backend. libusb has no device-tree node, so the node path is
//! synthesized as `/usb@<bus>/device@<address>`.

use super::UsbBackend;
use crate::error::DiscoveryError;
use crate::filter::{DeviceFilter, parse_filters};
use crate::registry::DeviceRegistry;
use anyhow::{Context as _, Result};
use identity::{DeviceIdentity, DeviceSpeed, NodePath, PassSummary};
use rusb::{Context, Device, UsbContext};
use tracing::{debug, warn};

pub struct LibusbBackend {
    context: Context,
    filters: Vec<DeviceFilter>,
}

impl LibusbBackend {
    pub fn new(filters: &[String]) -> Result<Self> {
        let context = Context::new().context("Failed to create libusb context")?;
        Ok(Self {
            context,
            filters: parse_filters(filters)?,
        })
    }

    fn identity(&self, device: &Device<Context>) -> Option<DeviceIdentity> {
        let bus = device.bus_number();
        let address = device.address();

        let desc = match device.device_descriptor() {
            Ok(desc) => desc,
            Err(e) => {
                warn!(
                    "Failed to read descriptor of bus={}, addr={}: {}",
                    bus, address, e
                );
                return None;
            }
        };

        if !crate::filter::is_allowed(desc.vendor_id(), desc.product_id(), &self.filters) {
            debug!(
                "Device ignored by filter: bus={}, addr={}, vid={:#x}, pid={:#x}",
                bus,
                address,
                desc.vendor_id(),
                desc.product_id()
            );
            return None;
        }

        let node_path = NodePath::new(format!("/usb@{}/device@{}", bus, address)).ok()?;
        Some(DeviceIdentity::new(
            bus,
            address,
            desc.num_configurations(),
            map_device_speed(device.speed()),
            node_path,
        ))
    }
}

impl UsbBackend for LibusbBackend {
    fn name(&self) -> &'static str {
        "libusb"
    }

    fn get_device_list(
        &mut self,
        registry: &mut dyn DeviceRegistry,
    ) -> Result<PassSummary, DiscoveryError> {
        let devices = self
            .context
            .devices()
            .map_err(|e| DiscoveryError::Backend(e.to_string()))?;

        let mut summary = PassSummary::default();
        for device in devices.iter() {
            summary.instances += 1;
            match self.identity(&device) {
                Some(identity) => {
                    summary.devices += 1;
                    registry.register(identity);
                }
                None => summary.discarded += 1,
            }
        }

        registry.end_of_pass(&summary);
        Ok(summary)
    }
}

/// Map rusb device speed to DeviceSpeed
fn map_device_speed(speed: rusb::Speed) -> DeviceSpeed {
    match speed {
        rusb::Speed::Low => DeviceSpeed::Low,
        rusb::Speed::Full => DeviceSpeed::Full,
        rusb::Speed::High => DeviceSpeed::High,
        rusb::Speed::Super | rusb::Speed::SuperPlus => DeviceSpeed::Super,
        _ => DeviceSpeed::Full,
    }
}
