//! Device identity types for devtree-usb
//!
//! This crate defines the records that flow from the discovery core to a
//! device registry: the per-device [`DeviceIdentity`], its [`SessionId`],
//! the [`DeviceSpeed`] classification and the device-tree [`NodePath`] it was
//! derived from. It also carries the error vocabulary shared by the backends.
//!
//! # Example
//!
//! ```
//! use identity::{DeviceIdentity, DeviceSpeed, NodePath, SessionId};
//!
//! let node = NodePath::new("/pci@0,0/pci106b,3f@6/device@2").unwrap();
//! let id = DeviceIdentity::new(0x12, 0x34, 1, DeviceSpeed::High, node);
//!
//! assert_eq!(id.session_id(), SessionId(0x1234));
//! ```

pub mod error;
pub mod types;

pub use error::{BackendError, IdentityError};
pub use types::{DeviceIdentity, DeviceSpeed, NodePath, PassSummary, SessionId};
