//! Live device tree through illumos libdevinfo
//!
//! Each [`LibDevInfo::open`] takes a snapshot of one node with
//! [`devinfo::DevInfo::new_path`] and reads its integer and boolean
//! properties. The snapshot is released when the returned [`DevInfoNode`]
//! is dropped.

use super::{DeviceNode, DeviceTree, PropLookup};
use devinfo::{DevInfo, PropType, Property};
use identity::NodePath;
use std::collections::HashMap;
use std::io;

/// The kernel device tree
#[derive(Debug, Clone, Copy, Default)]
pub struct LibDevInfo;

impl DeviceTree for LibDevInfo {
    type Node = DevInfoNode;

    fn open(&self, path: &NodePath) -> io::Result<DevInfoNode> {
        let mut snapshot = DevInfo::new_path(path.as_str()).map_err(devinfo_error)?;

        let mut props = HashMap::new();
        {
            let mut walk = snapshot.walk_node();
            // The walk visits the snapshot root, i.e. the node at `path`, first
            let node = walk
                .next()
                .transpose()
                .map_err(devinfo_error)?
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "empty snapshot"))?;

            let mut pw = node.props();
            while let Some(prop) = pw.next().transpose().map_err(devinfo_error)? {
                if let Some(values) = int_values(&prop) {
                    props.insert(prop.name(), values);
                }
            }
        }

        Ok(DevInfoNode {
            props,
            _snapshot: snapshot,
        })
    }
}

/// Integer properties of one node, valid while the snapshot is held
pub struct DevInfoNode {
    props: HashMap<String, Vec<i32>>,
    _snapshot: DevInfo,
}

impl DeviceNode for DevInfoNode {
    fn lookup_ints(&self, name: &str) -> PropLookup {
        match self.props.get(name) {
            Some(values) => PropLookup::Values(values.clone()),
            None => PropLookup::Absent(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no integer property \"{}\"", name),
            )),
        }
    }
}

/// Values of an int or boolean property; `None` for any other type
///
/// Boolean properties carry no value. For int arrays libdevinfo only hands
/// out the first element.
fn int_values(prop: &Property<'_>) -> Option<Vec<i32>> {
    match prop.value_type() {
        PropType::Boolean => Some(Vec::new()),
        PropType::Int32 => Some(prop.as_i32().into_iter().collect()),
        _ => None,
    }
}

fn devinfo_error(e: anyhow::Error) -> io::Error {
    io::Error::other(format!("{:#}", e))
}
