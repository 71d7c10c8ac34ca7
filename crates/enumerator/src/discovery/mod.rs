//! One discovery pass: walk the namespace, resolve every candidate, report
//! identities to a registry.

pub mod path;
pub mod resolver;
pub mod walker;

use crate::config::DiscoverySettings;
use crate::devtree::DeviceTree;
use crate::error::DiscoveryError;
use crate::registry::DeviceRegistry;
use identity::{IdentityError, PassSummary};
use resolver::Resolver;
use tracing::{error, info, warn};
use walker::Walker;

pub use path::{BoundedPath, PathError};
pub use resolver::{SPEED_PROPERTIES, classify_speed, parse_leading_int};

/// Discovery over a device tree `T`
pub struct Discovery<T: DeviceTree> {
    settings: DiscoverySettings,
    tree: T,
}

impl<T: DeviceTree> Discovery<T> {
    pub fn new(settings: DiscoverySettings, tree: T) -> Self {
        Self { settings, tree }
    }

    pub fn settings(&self) -> &DiscoverySettings {
        &self.settings
    }

    /// Run one pass, handing each identity to `registry`
    ///
    /// A pass that completes, even with every candidate discarded, ends with
    /// `registry.end_of_pass`. A fatal error returns before any candidate is
    /// produced and sends no end-of-pass signal.
    pub fn discover(
        &self,
        registry: &mut dyn DeviceRegistry,
    ) -> Result<PassSummary, DiscoveryError> {
        let walker = Walker::new(&self.settings)?;
        let resolver = Resolver::new(&self.tree, self.settings.num_configs_policy);
        let mut summary = PassSummary::default();

        walker.walk(&mut summary, |node_path, summary| {
            match resolver.resolve(&node_path) {
                Ok(identity) => {
                    summary.devices += 1;
                    registry.register(identity);
                }
                Err(e) => {
                    summary.discarded += 1;
                    match e {
                        IdentityError::NodeUnavailable { .. }
                        | IdentityError::NoUnitAddress { .. } => error!("{}, discarding", e),
                        _ => warn!("{}, discarding", e),
                    }
                }
            }
        })?;

        info!(
            groups = summary.groups,
            instances = summary.instances,
            devices = summary.devices,
            discarded = summary.discarded,
            "discovery pass complete"
        );
        registry.end_of_pass(&summary);

        Ok(summary)
    }
}
