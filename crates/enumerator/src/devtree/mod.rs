//! Device-tree property access
//!
//! A [`DeviceTree`] opens a property-query session ([`DeviceNode`]) on one
//! node path. The session is released when the node value is dropped, so a
//! caller that returns early with `?` still closes it.
//!
//! Two trees are provided:
//! - [`libdevinfo::LibDevInfo`] (illumos / Solaris): the live kernel
//!   device tree through libdevinfo.
//! - [`snapshot::SnapshotTree`]: a directory of per-node property files,
//!   for offline runs and tests.

#[cfg(any(target_os = "illumos", target_os = "solaris"))]
pub mod libdevinfo;
pub mod snapshot;

use identity::NodePath;
use std::io;
use tracing::trace;

pub use snapshot::SnapshotTree;

/// Raw answer of an integer property lookup
#[derive(Debug)]
pub enum PropLookup {
    /// Property exists; the vector holds its values and may be empty
    Values(Vec<i32>),
    /// Property does not exist or could not be read
    Absent(io::Error),
}

/// Open property-query session on a single node
pub trait DeviceNode {
    /// Look up an integer-array property by name
    fn lookup_ints(&self, name: &str) -> PropLookup;
}

/// Source of device-tree nodes
pub trait DeviceTree {
    type Node: DeviceNode;

    /// Open a property-query session on `path`
    fn open(&self, path: &NodePath) -> io::Result<Self::Node>;
}

impl<T: DeviceTree + ?Sized> DeviceTree for &T {
    type Node = T::Node;

    fn open(&self, path: &NodePath) -> io::Result<Self::Node> {
        (**self).open(path)
    }
}

/// Classified result of a single-integer property read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntProperty {
    /// Exactly one value
    Found(i32),
    /// Present, but carries no value
    Empty,
    /// Absent, or the lookup failed
    Missing,
    /// Present with an unexpected number of values
    Multiple(usize),
}

impl IntProperty {
    /// Whether the property exists at all, whatever its value count
    pub fn is_present(self) -> bool {
        !matches!(self, IntProperty::Missing)
    }

    /// The value, when there is exactly one
    pub fn value(self) -> Option<i32> {
        match self {
            IntProperty::Found(v) => Some(v),
            _ => None,
        }
    }
}

/// Read one integer property, tracing which outcome the lookup had
pub fn prop_get_int<N: DeviceNode + ?Sized>(node: &N, name: &str) -> IntProperty {
    trace!("looking for \"{}\" property", name);

    match node.lookup_ints(name) {
        PropLookup::Values(values) => match values.as_slice() {
            [value] => {
                trace!("found {} = {}", name, value);
                IntProperty::Found(*value)
            }
            [] => {
                trace!("property \"{}\" is empty", name);
                IntProperty::Empty
            }
            _ => {
                trace!("got {} values of \"{}\"", values.len(), name);
                IntProperty::Multiple(values.len())
            }
        },
        PropLookup::Absent(e) => {
            trace!("failed to get property \"{}\": {}", name, e);
            IntProperty::Missing
        }
    }
}
