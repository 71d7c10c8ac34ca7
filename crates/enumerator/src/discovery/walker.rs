//! `/dev/usb` namespace walker
//!
//! The namespace has two levels: `<vid>.<pid>` group directories, each
//! holding one directory per device instance. Every instance contains a
//! witness file (`devstat`) that is a symlink into `/devices`, e.g.
//!
//! ```text
//! /dev/usb/a12.1/0/devstat -> /devices/pci@0,0/pci106b,3f@6/device@2:a12.1.devstat
//! ```
//!
//! Resolving the witness, stripping the `/devices` prefix and cutting the
//! minor suffix at the colon yields the node path
//! `/pci@0,0/pci106b,3f@6/device@2`.

use super::path::{BoundedPath, PathError};
use crate::config::DiscoverySettings;
use crate::error::DiscoveryError;
use crate::filter::{DeviceFilter, is_allowed};
use identity::{IdentityError, NodePath, PassSummary};
use regex::Regex;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

/// Why an instance produced no node path
#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("Cannot compose witness path: {0}")]
    Compose(#[from] PathError),

    #[error("Cannot resolve {}: {source}", path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not under {}", path.display(), root.display())]
    OutsideDeviceTree { path: PathBuf, root: PathBuf },

    #[error("Device path {} is not valid UTF-8", path.display())]
    NotUtf8 { path: PathBuf },

    #[error(transparent)]
    InvalidNode(#[from] IdentityError),
}

/// Walker over the group/instance namespace
pub struct Walker<'a> {
    settings: &'a DiscoverySettings,
    pattern: Regex,
    filters: Vec<DeviceFilter>,
}

impl<'a> Walker<'a> {
    /// Prepare a walk, compiling the group pattern once
    ///
    /// Filters are expected to be validated with the configuration; any that
    /// fail to parse here are ignored.
    pub fn new(settings: &'a DiscoverySettings) -> Result<Self, DiscoveryError> {
        let pattern = Regex::new(&settings.group_pattern).map_err(|source| {
            error!("Failed to compile group pattern {:?}: {}", settings.group_pattern, source);
            DiscoveryError::Pattern {
                pattern: settings.group_pattern.clone(),
                source,
            }
        })?;

        let filters = settings
            .filters
            .iter()
            .filter_map(|f| match DeviceFilter::parse(f) {
                Ok(filter) => Some(filter),
                Err(e) => {
                    warn!("Ignoring device filter: {:#}", e);
                    None
                }
            })
            .collect();

        Ok(Self {
            settings,
            pattern,
            filters,
        })
    }

    /// Walk the namespace, handing each node path to `emit`
    ///
    /// Only an unreadable root is fatal. Every other failure skips the
    /// affected group or instance and is counted in `summary`.
    pub fn walk<F>(&self, summary: &mut PassSummary, mut emit: F) -> Result<(), DiscoveryError>
    where
        F: FnMut(NodePath, &mut PassSummary),
    {
        let root = &self.settings.dev_usb_root;
        let entries = fs::read_dir(root).map_err(|source| {
            error!("opendir(\"{}\") failed: {}", root.display(), source);
            DiscoveryError::RootUnreadable {
                path: root.clone(),
                source,
            }
        })?;

        debug!("start browsing {}", root.display());
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Failed to read entry of {}: {}, skipping", root.display(), e);
                    continue;
                }
            };

            let name = entry.file_name();
            let Some(group) = name.to_str().filter(|n| self.pattern.is_match(n)) else {
                if !is_hidden(&name) {
                    trace!("skipping {}", name.to_string_lossy());
                }
                continue;
            };

            debug!("found {}", group);
            if !self.group_allowed(group) {
                debug!("Group {} ignored by filter", group);
                continue;
            }

            summary.groups += 1;
            self.walk_group(group, summary, &mut emit);
        }
        debug!("stop browsing {}", root.display());

        Ok(())
    }

    fn walk_group<F>(&self, group: &str, summary: &mut PassSummary, emit: &mut F)
    where
        F: FnMut(NodePath, &mut PassSummary),
    {
        let group_path = match BoundedPath::new(&self.settings.dev_usb_root, self.capacity())
            .and_then(|root| root.join(OsStr::new(group)))
        {
            Ok(path) => path,
            Err(e) => {
                error!("Group path for {}: {}, skipping", group, e);
                summary.groups_skipped += 1;
                return;
            }
        };

        let entries = match fs::read_dir(group_path.as_path()) {
            Ok(entries) => entries,
            Err(e) => {
                error!(
                    "opendir(\"{}\") failed: {}, skipping",
                    group_path.as_path().display(),
                    e
                );
                summary.groups_skipped += 1;
                return;
            }
        };

        debug!("start browsing {}", group_path.as_path().display());
        for entry in entries {
            let instance = match entry {
                Ok(entry) => entry.file_name(),
                Err(e) => {
                    warn!(
                        "Failed to read entry of {}: {}, skipping",
                        group_path.as_path().display(),
                        e
                    );
                    continue;
                }
            };
            if is_hidden(&instance) {
                continue;
            }

            summary.instances += 1;
            info!(
                "found ugen device {}/{}",
                group_path.as_path().display(),
                instance.to_string_lossy()
            );

            match self.candidate(&group_path, &instance) {
                Ok(node_path) => emit(node_path, summary),
                Err(e) => {
                    summary.instances_skipped += 1;
                    match e {
                        CandidateError::OutsideDeviceTree { .. } => warn!("{}, skipping", e),
                        _ => error!("{}, skipping", e),
                    }
                }
            }
        }
        debug!("stop browsing {}", group_path.as_path().display());
    }

    /// Resolve one instance directory to its device-tree node path
    fn candidate(
        &self,
        group_path: &BoundedPath,
        instance: &OsStr,
    ) -> Result<NodePath, CandidateError> {
        let witness = group_path
            .join(instance)?
            .join(OsStr::new(&self.settings.witness_file))?;

        let resolved =
            fs::canonicalize(witness.as_path()).map_err(|source| CandidateError::Resolve {
                path: witness.as_path().to_path_buf(),
                source,
            })?;
        debug!("device path \"{}\"", resolved.display());

        node_path_from_resolved(&resolved, &self.settings.devices_root)
    }

    fn group_allowed(&self, group: &str) -> bool {
        if self.filters.is_empty() {
            return true;
        }
        match parse_group_ids(group) {
            Some((vid, pid)) => is_allowed(vid, pid, &self.filters),
            None => false,
        }
    }

    fn capacity(&self) -> usize {
        self.settings.path_capacity
    }
}

/// Turn a resolved witness path into a node path
///
/// Strips `devices_root` and cuts everything from the first `:` on. A path
/// without a colon is kept as is, with a warning.
pub fn node_path_from_resolved(
    resolved: &Path,
    devices_root: &Path,
) -> Result<NodePath, CandidateError> {
    let relative =
        resolved
            .strip_prefix(devices_root)
            .map_err(|_| CandidateError::OutsideDeviceTree {
                path: resolved.to_path_buf(),
                root: devices_root.to_path_buf(),
            })?;
    let relative = relative.to_str().ok_or_else(|| CandidateError::NotUtf8 {
        path: resolved.to_path_buf(),
    })?;

    let mut node = format!("/{}", relative);
    match node.find(':') {
        Some(colon) => node.truncate(colon),
        None => warn!("no colon in device node path {}", node),
    }

    Ok(NodePath::new(node)?)
}

/// Split a `<vid>.<pid>` group name into its hex ids
pub fn parse_group_ids(group: &str) -> Option<(u16, u16)> {
    let (vid, pid) = group.split_once('.')?;
    Some((
        u16::from_str_radix(vid, 16).ok()?,
        u16::from_str_radix(pid, 16).ok()?,
    ))
}

fn is_hidden(name: &OsStr) -> bool {
    name.as_encoded_bytes().first() == Some(&b'.')
}
