//! Directory-backed property snapshot
//!
//! Layout: `<root>/<node path>/<property name>`, one file per property,
//! holding whitespace-separated integers (decimal, or hex with `0x`).
//! An empty file is a present-but-empty property. For example the node
//! `/pci@0,0/pci106b,3f@6/device@2` keeps its bus number in
//! `<root>/pci@0,0/pci106b,3f@6/device@2/assigned-address`.

use super::{DeviceNode, DeviceTree, PropLookup};
use identity::NodePath;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Property tree read from a directory snapshot
#[derive(Debug, Clone)]
pub struct SnapshotTree {
    root: PathBuf,
}

impl SnapshotTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DeviceTree for SnapshotTree {
    type Node = SnapshotNode;

    fn open(&self, path: &NodePath) -> io::Result<SnapshotNode> {
        let dir = self.root.join(path.as_str().trim_start_matches('/'));
        if !fs::metadata(&dir)?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a node directory", dir.display()),
            ));
        }
        Ok(SnapshotNode { dir })
    }
}

/// One node directory of a [`SnapshotTree`]
#[derive(Debug)]
pub struct SnapshotNode {
    dir: PathBuf,
}

impl DeviceNode for SnapshotNode {
    fn lookup_ints(&self, name: &str) -> PropLookup {
        if name.is_empty() || name.contains('/') {
            return PropLookup::Absent(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid property name {:?}", name),
            ));
        }

        let text = match fs::read_to_string(self.dir.join(name)) {
            Ok(text) => text,
            Err(e) => return PropLookup::Absent(e),
        };

        let parsed: io::Result<Vec<i32>> = text.split_whitespace().map(parse_int).collect();
        match parsed {
            Ok(values) => PropLookup::Values(values),
            Err(e) => PropLookup::Absent(e),
        }
    }
}

fn parse_int(token: &str) -> io::Result<i32> {
    let parsed = match token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16).map(|v| v as i32),
        None => token.parse::<i32>(),
    };
    parsed.map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("bad integer {:?}: {}", token, e),
        )
    })
}
