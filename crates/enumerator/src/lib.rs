//! USB device discovery over the illumos device tree
//!
//! Walks the `/dev/usb/<vid>.<pid>/<instance>` namespace, resolves each
//! instance to its `/devices` node and derives a [`identity::DeviceIdentity`]
//! from the node's properties. Identities are pushed into a
//! [`registry::DeviceRegistry`]; the pass ends with an end-of-pass signal.
//!
//! Discovery is reached through the [`backend::UsbBackend`] capability
//! interface, which also exposes the handle, descriptor and transfer entry
//! points a device-management layer expects. The device-tree backend answers
//! those with "no device".

pub mod backend;
pub mod config;
pub mod devtree;
pub mod discovery;
pub mod error;
pub mod filter;
pub mod registry;
pub mod worker;

pub use backend::{UsbBackend, create_backend};
pub use config::EnumeratorConfig;
pub use discovery::Discovery;
pub use error::DiscoveryError;
pub use registry::{CollectingRegistry, DeviceRegistry};
