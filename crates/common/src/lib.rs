//! Common utilities for devtree-usb
//!
//! This crate provides shared functionality between the discovery core and
//! the `usb-enum` binary: error handling, logging setup, and the async
//! channel bridge that carries discovered identities from the blocking
//! discovery thread to a Tokio consumer.

pub mod channel;
pub mod error;
pub mod logging;
#[cfg(all(unix, any(test, feature = "test-utils")))]
pub mod test_utils;

pub use channel::{
    DiscoveryCommand, DiscoveryEvent, DiscoveryWorker, RegistryBridge, ScanOutcome,
    create_registry_bridge,
};
pub use error::{Error, Result};
pub use logging::setup_logging;
