//! Test utilities for devtree-usb
//!
//! Builds synthetic device namespaces on disk: a `/dev/usb`-style group and
//! instance hierarchy whose witness files are symlinks into a `/devices`-style
//! tree, plus a property snapshot directory the device-tree reader can query.
//!
//! Available to other crates through the `test-utils` feature.

use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Witness file name used by the fixtures
pub const WITNESS: &str = "devstat";

/// On-disk fixture of a USB device namespace
///
/// Everything lives under one temporary directory that is removed on drop.
pub struct FixtureTree {
    _dir: TempDir,
    dev_usb: PathBuf,
    devices: PathBuf,
    props: PathBuf,
}

impl FixtureTree {
    /// Create an empty fixture with `dev/usb`, `devices` and `props` roots
    ///
    /// The roots are canonicalized so that prefix checks against resolved
    /// witness paths work where the temp directory sits behind a symlink.
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let base = dir.path().canonicalize()?;

        let dev_usb = base.join("dev").join("usb");
        let devices = base.join("devices");
        let props = base.join("props");
        fs::create_dir_all(&dev_usb)?;
        fs::create_dir_all(&devices)?;
        fs::create_dir_all(&props)?;

        Ok(Self {
            _dir: dir,
            dev_usb,
            devices,
            props,
        })
    }

    pub fn dev_usb_root(&self) -> &Path {
        &self.dev_usb
    }

    pub fn devices_root(&self) -> &Path {
        &self.devices
    }

    pub fn props_root(&self) -> &Path {
        &self.props
    }

    /// Create a plain entry directly under the `dev/usb` root
    pub fn add_group_dir(&self, name: &str) -> io::Result<PathBuf> {
        let path = self.dev_usb.join(name);
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Create an instance whose witness points at `target`
    ///
    /// `target` may lie anywhere, including outside the devices root.
    pub fn add_witness(&self, group: &str, instance: &str, target: &Path) -> io::Result<PathBuf> {
        let instance_dir = self.dev_usb.join(group).join(instance);
        fs::create_dir_all(&instance_dir)?;
        let witness = instance_dir.join(WITNESS);
        symlink(target, &witness)?;
        Ok(witness)
    }

    /// Create a minor node file under the devices root and link an instance to it
    ///
    /// With `minor` set the file is `<node_path>:<minor>`, otherwise the node
    /// path itself is used as the file name.
    pub fn add_instance(
        &self,
        group: &str,
        instance: &str,
        node_path: &str,
        minor: Option<&str>,
    ) -> io::Result<PathBuf> {
        let relative = node_path.trim_start_matches('/');
        let file_name = match minor {
            Some(minor) => format!("{}:{}", relative, minor),
            None => relative.to_string(),
        };
        let target = self.devices.join(file_name);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, b"")?;
        self.add_witness(group, instance, &target)
    }

    /// Write an integer property for a node into the snapshot tree
    ///
    /// An empty `values` slice produces a present-but-empty property.
    pub fn set_property(&self, node_path: &str, name: &str, values: &[i32]) -> io::Result<()> {
        let node_dir = self.props.join(node_path.trim_start_matches('/'));
        fs::create_dir_all(&node_dir)?;
        let text = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        fs::write(node_dir.join(name), text)
    }

    /// Create the property directory of a node without any properties
    pub fn add_bare_node(&self, node_path: &str) -> io::Result<()> {
        fs::create_dir_all(self.props.join(node_path.trim_start_matches('/')))
    }

    /// Add a complete, well-formed device
    ///
    /// Links `<group>/<instance>/devstat` to `<node_path>:<group>.devstat`,
    /// and writes `assigned-address`, `usb-num-configs` and, if given, an
    /// empty speed property.
    pub fn add_device(
        &self,
        group: &str,
        instance: &str,
        node_path: &str,
        bus_number: i32,
        num_configs: i32,
        speed_property: Option<&str>,
    ) -> io::Result<()> {
        let minor = format!("{}.{}", group, WITNESS);
        self.add_instance(group, instance, node_path, Some(&minor))?;
        self.set_property(node_path, "assigned-address", &[bus_number])?;
        self.set_property(node_path, "usb-num-configs", &[num_configs])?;
        if let Some(speed) = speed_property {
            self.set_property(node_path, speed, &[])?;
        }
        Ok(())
    }
}
