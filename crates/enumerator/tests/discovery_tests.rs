//! End-to-end discovery passes over on-disk fixture trees

#![cfg(unix)]

use common::test_utils::FixtureTree;
use enumerator::config::{BackendKind, DiscoverySettings, EnumeratorConfig, NumConfigsPolicy};
use enumerator::devtree::{DeviceTree, SnapshotTree};
use enumerator::{CollectingRegistry, Discovery, DiscoveryError, create_backend};
use identity::{BackendError, DeviceSpeed, NodePath};
use std::cell::RefCell;
use std::fs;
use std::io;

fn settings(tree: &FixtureTree) -> DiscoverySettings {
    DiscoverySettings {
        dev_usb_root: tree.dev_usb_root().to_path_buf(),
        devices_root: tree.devices_root().to_path_buf(),
        ..Default::default()
    }
}

fn discovery(tree: &FixtureTree, settings: DiscoverySettings) -> Discovery<SnapshotTree> {
    Discovery::new(settings, SnapshotTree::new(tree.props_root()))
}

/// Snapshot tree that remembers every node it was asked to open
struct RecordingTree {
    inner: SnapshotTree,
    opened: RefCell<Vec<String>>,
}

impl DeviceTree for RecordingTree {
    type Node = <SnapshotTree as DeviceTree>::Node;

    fn open(&self, path: &NodePath) -> io::Result<Self::Node> {
        self.opened.borrow_mut().push(path.to_string());
        self.inner.open(path)
    }
}

#[test]
fn test_non_matching_groups_never_reach_resolver() {
    let tree = FixtureTree::new().unwrap();
    tree.add_device("a12.1", "0", "/pci@0,0/device@2", 1, 1, None)
        .unwrap();
    tree.add_device("A12.1", "0", "/pci@0,0/device@3", 1, 1, None)
        .unwrap();
    tree.add_device("hub", "0", "/pci@0,0/device@4", 1, 1, None)
        .unwrap();
    tree.add_device("a12.1.0", "0", "/pci@0,0/device@5", 1, 1, None)
        .unwrap();

    let recorder = RecordingTree {
        inner: SnapshotTree::new(tree.props_root()),
        opened: RefCell::new(Vec::new()),
    };
    let discovery = Discovery::new(settings(&tree), &recorder);
    let mut registry = CollectingRegistry::new();
    let summary = discovery.discover(&mut registry).unwrap();

    assert_eq!(*recorder.opened.borrow(), vec!["/pci@0,0/device@2".to_string()]);
    assert_eq!(summary.groups, 1);
    assert_eq!(registry.devices().len(), 1);
}

#[test]
fn test_witness_outside_devices_root_is_skipped() {
    let tree = FixtureTree::new().unwrap();
    let outside = tempfile::tempdir().unwrap();
    let target = outside.path().join("device@2:a12.1.devstat");
    fs::write(&target, b"").unwrap();
    tree.add_witness("a12.1", "0", &target).unwrap();

    let mut registry = CollectingRegistry::new();
    let summary = discovery(&tree, settings(&tree))
        .discover(&mut registry)
        .unwrap();

    assert!(registry.devices().is_empty());
    assert_eq!(summary.instances, 1);
    assert_eq!(summary.instances_skipped, 1);
    assert_eq!(registry.passes().len(), 1);
}

#[test]
fn test_dangling_witness_does_not_stop_the_walk() {
    let tree = FixtureTree::new().unwrap();
    let gone = tree.devices_root().join("pci@0,0/device@9:a12.1.devstat");
    tree.add_witness("a12.1", "0", &gone).unwrap();
    tree.add_device("a12.1", "1", "/pci@0,0/device@2", 1, 1, None)
        .unwrap();

    let mut registry = CollectingRegistry::new();
    let summary = discovery(&tree, settings(&tree))
        .discover(&mut registry)
        .unwrap();

    assert_eq!(summary.instances, 2);
    assert_eq!(summary.instances_skipped, 1);
    assert_eq!(summary.devices, 1);
    assert_eq!(registry.devices()[0].node_path().as_str(), "/pci@0,0/device@2");
    assert_eq!(registry.passes().len(), 1);
}

#[test]
fn test_session_id_packs_bus_and_address() {
    let tree = FixtureTree::new().unwrap();
    // device@52: address 52 decimal = 0x34
    tree.add_device("a12.1", "0", "/pci@0,0/pci106b,3f@6/device@52", 0x12, 1, Some("high-speed"))
        .unwrap();

    let mut registry = CollectingRegistry::new();
    discovery(&tree, settings(&tree))
        .discover(&mut registry)
        .unwrap();

    let device = &registry.devices()[0];
    assert_eq!(device.bus_number(), 0x12);
    assert_eq!(device.device_address(), 0x34);
    assert_eq!(device.session_id().0, 0x1234);
    assert_eq!(device.session_id().to_string(), "0x1234");
    assert_eq!(device.speed(), DeviceSpeed::High);
    assert_eq!(device.node_path().as_str(), "/pci@0,0/pci106b,3f@6/device@52");
}

#[test]
fn test_default_speed_and_lenient_num_configs() {
    let tree = FixtureTree::new().unwrap();
    tree.add_instance("a12.1", "0", "/pci@0,0/device@7", Some("a12.1.devstat"))
        .unwrap();
    tree.set_property("/pci@0,0/device@7", "assigned-address", &[1])
        .unwrap();

    let mut strict_registry = CollectingRegistry::new();
    let summary = discovery(&tree, settings(&tree))
        .discover(&mut strict_registry)
        .unwrap();
    assert!(strict_registry.devices().is_empty());
    assert_eq!(summary.discarded, 1);

    let lenient = DiscoverySettings {
        num_configs_policy: NumConfigsPolicy::DefaultOne,
        ..settings(&tree)
    };
    let mut registry = CollectingRegistry::new();
    discovery(&tree, lenient).discover(&mut registry).unwrap();

    let device = &registry.devices()[0];
    assert_eq!(device.speed(), DeviceSpeed::Full);
    assert_eq!(device.num_configs(), 1);
    assert_eq!(device.device_address(), 7);
}

#[test]
fn test_low_speed_wins_over_high_speed() {
    let tree = FixtureTree::new().unwrap();
    tree.add_device("a12.1", "0", "/pci@0,0/device@2", 1, 1, Some("high-speed"))
        .unwrap();
    tree.set_property("/pci@0,0/device@2", "low-speed", &[])
        .unwrap();

    let mut registry = CollectingRegistry::new();
    discovery(&tree, settings(&tree))
        .discover(&mut registry)
        .unwrap();

    assert_eq!(registry.devices()[0].speed(), DeviceSpeed::Low);
}

#[test]
fn test_missing_bus_number_discards_and_continues() {
    let tree = FixtureTree::new().unwrap();
    tree.add_instance("a12.1", "0", "/pci@0,0/device@2", Some("a12.1.devstat"))
        .unwrap();
    tree.set_property("/pci@0,0/device@2", "usb-num-configs", &[1])
        .unwrap();
    tree.add_device("a12.1", "1", "/pci@0,0/device@3", 2, 1, None)
        .unwrap();

    let mut registry = CollectingRegistry::new();
    let summary = discovery(&tree, settings(&tree))
        .discover(&mut registry)
        .unwrap();

    assert_eq!(registry.devices().len(), 1);
    assert_eq!(registry.devices()[0].device_address(), 3);
    assert_eq!(summary.discarded, 1);
    assert_eq!(summary.devices, 1);
}

#[test]
fn test_path_without_unit_address_discards() {
    let tree = FixtureTree::new().unwrap();
    tree.add_instance("a12.1", "0", "/pseudo/ugen", Some("a12.1.devstat"))
        .unwrap();
    tree.set_property("/pseudo/ugen", "assigned-address", &[1])
        .unwrap();
    tree.set_property("/pseudo/ugen", "usb-num-configs", &[1])
        .unwrap();

    let mut registry = CollectingRegistry::new();
    let summary = discovery(&tree, settings(&tree))
        .discover(&mut registry)
        .unwrap();

    assert!(registry.devices().is_empty());
    assert_eq!(summary.discarded, 1);
    assert_eq!(registry.passes().len(), 1);
}

#[test]
fn test_node_without_properties_is_discarded() {
    let tree = FixtureTree::new().unwrap();
    tree.add_instance("a12.1", "0", "/pci@0,0/device@2", Some("a12.1.devstat"))
        .unwrap();

    let mut registry = CollectingRegistry::new();
    let summary = discovery(&tree, settings(&tree))
        .discover(&mut registry)
        .unwrap();

    assert!(registry.devices().is_empty());
    assert_eq!(summary.discarded, 1);
}

#[test]
fn test_missing_colon_keeps_candidate() {
    let tree = FixtureTree::new().unwrap();
    tree.add_instance("a12.1", "0", "/pci@0,0/device@9", None)
        .unwrap();
    tree.set_property("/pci@0,0/device@9", "assigned-address", &[4])
        .unwrap();
    tree.set_property("/pci@0,0/device@9", "usb-num-configs", &[2])
        .unwrap();

    let mut registry = CollectingRegistry::new();
    discovery(&tree, settings(&tree))
        .discover(&mut registry)
        .unwrap();

    let device = &registry.devices()[0];
    assert_eq!(device.node_path().as_str(), "/pci@0,0/device@9");
    assert_eq!(device.num_configs(), 2);
}

#[test]
fn test_out_of_range_bus_number_discards() {
    let tree = FixtureTree::new().unwrap();
    tree.add_device("a12.1", "0", "/pci@0,0/device@2", 300, 1, None)
        .unwrap();

    let mut registry = CollectingRegistry::new();
    let summary = discovery(&tree, settings(&tree))
        .discover(&mut registry)
        .unwrap();

    assert!(registry.devices().is_empty());
    assert_eq!(summary.discarded, 1);
}

#[test]
fn test_hidden_entries_are_ignored() {
    let tree = FixtureTree::new().unwrap();
    tree.add_device("a12.1", "0", "/pci@0,0/device@2", 1, 1, None)
        .unwrap();
    tree.add_device("a12.1", ".1", "/pci@0,0/device@3", 1, 1, None)
        .unwrap();
    tree.add_group_dir(".cache").unwrap();

    let mut registry = CollectingRegistry::new();
    let summary = discovery(&tree, settings(&tree))
        .discover(&mut registry)
        .unwrap();

    assert_eq!(summary.instances, 1);
    assert_eq!(registry.devices().len(), 1);
}

#[test]
fn test_every_instance_of_a_group_is_visited() {
    let tree = FixtureTree::new().unwrap();
    tree.add_device("a12.1", "0", "/pci@0,0/device@2", 1, 1, None)
        .unwrap();
    tree.add_device("a12.1", "1", "/pci@0,0/device@3", 1, 1, None)
        .unwrap();
    tree.add_device("bda.8153", "0", "/pci@0,0/hub@1/device@4", 2, 1, Some("super-speed"))
        .unwrap();

    let mut registry = CollectingRegistry::new();
    let summary = discovery(&tree, settings(&tree))
        .discover(&mut registry)
        .unwrap();

    let mut sessions: Vec<u64> = registry.devices().iter().map(|d| d.session_id().0).collect();
    sessions.sort_unstable();
    assert_eq!(sessions, vec![0x0102, 0x0103, 0x0204]);
    assert_eq!(summary.groups, 2);
    assert_eq!(summary.instances, 3);
    assert_eq!(summary.devices, 3);
}

#[test]
fn test_filters_restrict_groups() {
    let tree = FixtureTree::new().unwrap();
    tree.add_device("a12.1", "0", "/pci@0,0/device@2", 1, 1, None)
        .unwrap();
    tree.add_device("bda.8153", "0", "/pci@0,0/device@3", 1, 1, None)
        .unwrap();

    let filtered = DiscoverySettings {
        filters: vec!["0x0a12:*".to_string()],
        ..settings(&tree)
    };
    let mut registry = CollectingRegistry::new();
    let summary = discovery(&tree, filtered).discover(&mut registry).unwrap();

    assert_eq!(summary.groups, 1);
    assert_eq!(registry.devices().len(), 1);
    assert_eq!(registry.devices()[0].device_address(), 2);
}

#[test]
fn test_unreadable_group_is_skipped() {
    let tree = FixtureTree::new().unwrap();
    fs::write(tree.dev_usb_root().join("dead.beef"), b"").unwrap();
    tree.add_device("a12.1", "0", "/pci@0,0/device@2", 1, 1, None)
        .unwrap();

    let mut registry = CollectingRegistry::new();
    let summary = discovery(&tree, settings(&tree))
        .discover(&mut registry)
        .unwrap();

    assert_eq!(summary.groups, 2);
    assert_eq!(summary.groups_skipped, 1);
    assert_eq!(registry.devices().len(), 1);
}

#[test]
fn test_path_overflow_skips_instance() {
    let tree = FixtureTree::new().unwrap();
    tree.add_device("a12.1", "0", "/pci@0,0/device@2", 1, 1, None)
        .unwrap();

    // Room for "<root>/a12.1/0" but not for the witness below it
    let root_len = tree.dev_usb_root().as_os_str().len();
    let tight = DiscoverySettings {
        path_capacity: root_len + "/a12.1/0".len() + 2,
        ..settings(&tree)
    };
    let mut registry = CollectingRegistry::new();
    let summary = discovery(&tree, tight).discover(&mut registry).unwrap();

    assert!(registry.devices().is_empty());
    assert_eq!(summary.instances_skipped, 1);
    assert_eq!(registry.passes().len(), 1);
}

#[test]
fn test_empty_namespace_still_ends_pass() {
    let tree = FixtureTree::new().unwrap();

    let mut registry = CollectingRegistry::new();
    let summary = discovery(&tree, settings(&tree))
        .discover(&mut registry)
        .unwrap();

    assert_eq!(summary.candidates(), 0);
    assert_eq!(registry.passes(), &[summary]);
}

#[test]
fn test_missing_root_is_fatal() {
    let tree = FixtureTree::new().unwrap();
    let missing = DiscoverySettings {
        dev_usb_root: tree.dev_usb_root().join("nope"),
        ..settings(&tree)
    };

    let mut registry = CollectingRegistry::new();
    let err = discovery(&tree, missing)
        .discover(&mut registry)
        .unwrap_err();

    assert!(matches!(err, DiscoveryError::RootUnreadable { .. }));
    assert_eq!(err.backend_code(), BackendError::Access);
    assert!(registry.passes().is_empty());
}

#[test]
fn test_bad_group_pattern_is_fatal() {
    let tree = FixtureTree::new().unwrap();
    tree.add_device("a12.1", "0", "/pci@0,0/device@2", 1, 1, None)
        .unwrap();
    let bad = DiscoverySettings {
        group_pattern: "([0-9a-f]+".to_string(),
        ..settings(&tree)
    };

    let mut registry = CollectingRegistry::new();
    let err = discovery(&tree, bad).discover(&mut registry).unwrap_err();

    assert!(matches!(err, DiscoveryError::Pattern { .. }));
    assert!(registry.devices().is_empty());
    assert!(registry.passes().is_empty());
}

#[test]
fn test_snapshot_backend_from_config() {
    let tree = FixtureTree::new().unwrap();
    tree.add_device("a12.1", "0", "/pci@0,0/device@2", 3, 1, Some("low-speed"))
        .unwrap();

    let mut config = EnumeratorConfig::default();
    config.general.backend = BackendKind::Devinfo;
    config.discovery = DiscoverySettings {
        snapshot_root: Some(tree.props_root().to_path_buf()),
        ..settings(&tree)
    };

    let mut backend = create_backend(&config).unwrap();
    let mut registry = CollectingRegistry::new();
    let summary = backend.get_device_list(&mut registry).unwrap();

    assert_eq!(backend.name(), "devinfo");
    assert_eq!(summary.devices, 1);
    assert_eq!(registry.devices()[0].session_id().0, 0x0302);
    assert_eq!(registry.devices()[0].speed(), DeviceSpeed::Low);
}
