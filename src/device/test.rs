use std::sync::Arc;

use super::{node_index, Device, DeviceInfo, Registry, MAX_DEVICES};

fn fake_device(id: i32) -> Device {
    Device {
        file: Arc::new(tempfile::tempfile().unwrap()),
        info: DeviceInfo {
            id,
            ..Default::default()
        },
    }
}

#[test]
fn test_node_index() {
    assert_eq!(node_index("event0"), Some(0));
    assert_eq!(node_index("event17"), Some(17));
    assert_eq!(node_index("event"), None);
    assert_eq!(node_index("eventx"), None);
    assert_eq!(node_index("event-3"), None);
    assert_eq!(node_index("mouse0"), None);
    assert_eq!(node_index("mice"), None);
}

#[test]
fn test_insert_and_resolve() {
    let mut reg = Registry::new();
    let (slot, gen) = reg.insert(fake_device(3)).unwrap();
    assert_eq!(reg.count(), 1);
    assert!(reg.has(3));
    assert_eq!(reg.get(slot, gen).unwrap().info.id, 3);
}

#[test]
fn test_remove_compacts_and_invalidates() {
    let mut reg = Registry::new();
    let (slot, gen) = reg.insert(fake_device(3)).unwrap();
    assert!(reg.remove(3).is_some());
    assert_eq!(reg.count(), 0);
    assert!(!reg.has(3));
    assert!(reg.get(slot, gen).is_none());
    assert!(reg.remove(3).is_none());
}

#[test]
fn test_stale_generation_after_reuse() {
    let mut reg = Registry::new();
    let (slot, gen) = reg.insert(fake_device(3)).unwrap();
    reg.remove(3).unwrap();
    let (slot2, gen2) = reg.insert(fake_device(4)).unwrap();
    // The slot is reused with a bumped generation; the old discriminator
    // must not resolve to the new tenant.
    assert_eq!(slot, slot2);
    assert_ne!(gen, gen2);
    assert!(reg.get(slot, gen).is_none());
    assert_eq!(reg.get(slot2, gen2).unwrap().info.id, 4);
}

#[test]
fn test_capacity_bound() {
    let mut reg = Registry::new();
    for id in 0..MAX_DEVICES as i32 {
        assert!(reg.insert(fake_device(id)).is_some());
    }
    assert!(reg.insert(fake_device(999)).is_none());
    assert_eq!(reg.count(), MAX_DEVICES);
}

#[test]
fn test_drain_empties() {
    let mut reg = Registry::new();
    reg.insert(fake_device(1)).unwrap();
    reg.insert(fake_device(2)).unwrap();
    let drained = reg.drain();
    assert_eq!(drained.len(), 2);
    assert_eq!(reg.count(), 0);
    assert!(reg.iter().next().is_none());
}
