//! Device identity type definitions
//!
//! These are the records produced by a discovery pass. Everything here is
//! plain data: construction enforces the invariants, and the registry that
//! receives a [`DeviceIdentity`] owns it from then on.

use crate::error::IdentityError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Session identifier
///
/// Process-lifetime identifier of a device instance, packed from the bus
/// number (high byte) and the device address (low byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Pack a bus number and device address into a session identifier
    pub fn from_parts(bus_number: u8, device_address: u8) -> Self {
        Self((u64::from(bus_number) << 8) | u64::from(device_address))
    }

    /// Bus number half of the identifier
    pub fn bus_number(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Device address half of the identifier
    pub fn device_address(self) -> u8 {
        self.0 as u8
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// USB device speed
///
/// Super speed is accepted as a classification only; nothing downstream
/// implements super-speed transfer semantics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpeed {
    /// Low speed - 1.5 Mbps (USB 1.0)
    Low,
    /// Full speed - 12 Mbps (USB 1.1)
    #[default]
    Full,
    /// High speed - 480 Mbps (USB 2.0)
    High,
    /// SuperSpeed - 5 Gbps (USB 3.0)
    Super,
}

impl DeviceSpeed {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceSpeed::Low => "low",
            DeviceSpeed::Full => "full",
            DeviceSpeed::High => "high",
            DeviceSpeed::Super => "super",
        }
    }
}

impl fmt::Display for DeviceSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical device-tree node path
///
/// Absolute path of a node relative to the device-tree root, with the minor
/// suffix already removed, e.g. `/pci@0,0/pci106b,3f@6/device@2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePath(String);

impl NodePath {
    /// Create a node path, rejecting anything that is not absolute
    pub fn new(path: impl Into<String>) -> Result<Self, IdentityError> {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(IdentityError::InvalidNodePath { path });
        }
        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Text after the last `@`, i.e. the unit address of the leaf node
    ///
    /// Returns `None` when the path has no `@` at all.
    pub fn unit_address(&self) -> Option<&str> {
        self.0.rfind('@').map(|at| &self.0[at + 1..])
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NodePath {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodePath> for String {
    fn from(value: NodePath) -> Self {
        value.0
    }
}

/// Identity of one discovered USB device
///
/// Immutable once built. `session_id` is always derived from `bus_number`
/// and `device_address`, and `num_configs` is never zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    session_id: SessionId,
    bus_number: u8,
    device_address: u8,
    num_configs: u8,
    speed: DeviceSpeed,
    node_path: NodePath,
}

impl DeviceIdentity {
    /// Build an identity record
    ///
    /// A `num_configs` of zero is raised to one; every device has at least
    /// its default configuration.
    pub fn new(
        bus_number: u8,
        device_address: u8,
        num_configs: u8,
        speed: DeviceSpeed,
        node_path: NodePath,
    ) -> Self {
        Self {
            session_id: SessionId::from_parts(bus_number, device_address),
            bus_number,
            device_address,
            num_configs: num_configs.max(1),
            speed,
            node_path,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn bus_number(&self) -> u8 {
        self.bus_number
    }

    pub fn device_address(&self) -> u8 {
        self.device_address
    }

    pub fn num_configs(&self) -> u8 {
        self.num_configs
    }

    pub fn speed(&self) -> DeviceSpeed {
        self.speed
    }

    pub fn node_path(&self) -> &NodePath {
        &self.node_path
    }
}

/// Counters describing one discovery pass
///
/// Handed to the registry together with the end-of-pass signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    /// Group directories that matched the vendor.product pattern
    pub groups: u32,
    /// Matching groups that could not be opened
    pub groups_skipped: u32,
    /// Instance entries seen inside matching groups
    pub instances: u32,
    /// Instances dropped before reaching the resolver
    pub instances_skipped: u32,
    /// Candidates the resolver discarded
    pub discarded: u32,
    /// Identities handed to the registry
    pub devices: u32,
}

impl PassSummary {
    /// Candidates that reached the resolver
    pub fn candidates(&self) -> u32 {
        self.devices + self.discarded
    }
}
