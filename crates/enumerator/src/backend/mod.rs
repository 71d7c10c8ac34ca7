//! USB backend capability interface
//!
//! A backend enumerates devices into a [`DeviceRegistry`] and exposes the
//! handle, descriptor and transfer entry points a device-management layer
//! calls. Backends that only discover devices keep the default
//! implementations, which report [`BackendError::NoDevice`].

pub mod devinfo;
pub mod libusb;

use crate::config::{BackendKind, EnumeratorConfig};
use crate::devtree::SnapshotTree;
use crate::error::DiscoveryError;
use crate::registry::DeviceRegistry;
use anyhow::Result;
use identity::{BackendError, DeviceIdentity, PassSummary};
use std::time::Duration;
use tracing::info;

pub use devinfo::DevInfoBackend;
pub use libusb::LibusbBackend;

/// Result of a backend entry point
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Open device handle, assigned by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(pub u32);

/// In-flight transfer, assigned by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferId(pub u64);

/// Clock selector for [`UsbBackend::clock_gettime`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockId {
    Realtime,
    Monotonic,
    /// Any other id; always rejected
    Other(i32),
}

/// Capability table of a USB backend
pub trait UsbBackend: Send {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Enumerate attached devices into `registry`
    ///
    /// A completed pass ends with `registry.end_of_pass`.
    fn get_device_list(
        &mut self,
        registry: &mut dyn DeviceRegistry,
    ) -> std::result::Result<PassSummary, DiscoveryError>;

    fn open(&mut self, _device: &DeviceIdentity) -> BackendResult<HandleId> {
        Err(BackendError::NoDevice)
    }

    fn close(&mut self, _handle: HandleId) {}

    fn get_device_descriptor(&self, _device: &DeviceIdentity) -> BackendResult<Vec<u8>> {
        Err(BackendError::NoDevice)
    }

    fn get_active_config_descriptor(&self, _device: &DeviceIdentity) -> BackendResult<Vec<u8>> {
        Err(BackendError::NoDevice)
    }

    fn get_config_descriptor(
        &self,
        _device: &DeviceIdentity,
        _config_index: u8,
    ) -> BackendResult<Vec<u8>> {
        Err(BackendError::NoDevice)
    }

    fn get_configuration(&self, _handle: HandleId) -> BackendResult<u8> {
        Err(BackendError::NoDevice)
    }

    fn set_configuration(&mut self, _handle: HandleId, _config: i32) -> BackendResult<()> {
        Err(BackendError::NoDevice)
    }

    fn claim_interface(&mut self, _handle: HandleId, _interface: u8) -> BackendResult<()> {
        Err(BackendError::NoDevice)
    }

    fn release_interface(&mut self, _handle: HandleId, _interface: u8) -> BackendResult<()> {
        Err(BackendError::NoDevice)
    }

    fn set_interface_altsetting(
        &mut self,
        _handle: HandleId,
        _interface: u8,
        _altsetting: u8,
    ) -> BackendResult<()> {
        Err(BackendError::NoDevice)
    }

    fn clear_halt(&mut self, _handle: HandleId, _endpoint: u8) -> BackendResult<()> {
        Err(BackendError::NoDevice)
    }

    fn reset_device(&mut self, _handle: HandleId) -> BackendResult<()> {
        Err(BackendError::NoDevice)
    }

    /// Release backend state attached to a device record
    fn destroy_device(&mut self, _device: &DeviceIdentity) {}

    fn submit_transfer(
        &mut self,
        _handle: HandleId,
        _endpoint: u8,
        _data: &mut [u8],
    ) -> BackendResult<TransferId> {
        Err(BackendError::NoDevice)
    }

    fn cancel_transfer(&mut self, _transfer: TransferId) -> BackendResult<()> {
        Err(BackendError::NotSupported)
    }

    fn clear_transfer_priv(&mut self, _transfer: TransferId) {}

    /// Process pending completions, waiting at most `timeout`
    fn handle_events(&mut self, _timeout: Option<Duration>) -> BackendResult<()> {
        Err(BackendError::NoDevice)
    }

    fn clock_gettime(&self, clock: ClockId) -> BackendResult<Duration> {
        clock_gettime(clock)
    }
}

/// Read a system clock
#[cfg(unix)]
pub fn clock_gettime(clock: ClockId) -> BackendResult<Duration> {
    use nix::time::{self, ClockId as NixClockId};

    let id = match clock {
        ClockId::Realtime => NixClockId::CLOCK_REALTIME,
        ClockId::Monotonic => NixClockId::CLOCK_MONOTONIC,
        ClockId::Other(_) => return Err(BackendError::InvalidParam),
    };

    let ts = time::clock_gettime(id).map_err(|_| BackendError::Io)?;
    let secs = u64::try_from(ts.tv_sec()).map_err(|_| BackendError::InvalidParam)?;
    let nanos = u32::try_from(ts.tv_nsec()).map_err(|_| BackendError::InvalidParam)?;
    Ok(Duration::new(secs, nanos))
}

/// Read a system clock
#[cfg(not(unix))]
pub fn clock_gettime(clock: ClockId) -> BackendResult<Duration> {
    match clock {
        ClockId::Realtime => std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|_| BackendError::InvalidParam),
        ClockId::Monotonic => Err(BackendError::NotSupported),
        ClockId::Other(_) => Err(BackendError::InvalidParam),
    }
}

/// Backend kind that `Auto` stands for with this configuration
pub fn resolve_kind(config: &EnumeratorConfig) -> BackendKind {
    match config.general.backend {
        BackendKind::Auto => {
            if config.discovery.snapshot_root.is_some()
                || cfg!(any(target_os = "illumos", target_os = "solaris"))
            {
                BackendKind::Devinfo
            } else {
                BackendKind::Libusb
            }
        }
        kind => kind,
    }
}

/// Create the backend selected by `config`
pub fn create_backend(config: &EnumeratorConfig) -> Result<Box<dyn UsbBackend>> {
    let settings = config.discovery.clone();

    let backend: Box<dyn UsbBackend> = match resolve_kind(config) {
        BackendKind::Libusb => Box::new(LibusbBackend::new(&settings.filters)?),
        _ => match settings.snapshot_root.clone() {
            Some(root) => Box::new(DevInfoBackend::new(settings, SnapshotTree::new(root))),
            None => live_devinfo_backend(settings)?,
        },
    };

    info!("Using {} backend", backend.name());
    Ok(backend)
}

#[cfg(any(target_os = "illumos", target_os = "solaris"))]
fn live_devinfo_backend(settings: crate::config::DiscoverySettings) -> Result<Box<dyn UsbBackend>> {
    use crate::devtree::libdevinfo::LibDevInfo;

    Ok(Box::new(DevInfoBackend::new(settings, LibDevInfo)))
}

#[cfg(not(any(target_os = "illumos", target_os = "solaris")))]
fn live_devinfo_backend(
    _settings: crate::config::DiscoverySettings,
) -> Result<Box<dyn UsbBackend>> {
    Err(anyhow::anyhow!(
        "The devinfo backend needs libdevinfo (illumos/Solaris); set snapshot_root to use a property snapshot"
    ))
}
