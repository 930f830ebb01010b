#[cfg(test)]
mod test;

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ffi::{bindings as b, syscall};

/// Upper bound on simultaneously open endpoints.
pub(crate) const MAX_DEVICES: usize = 128;

/// Identity and metadata of an input endpoint, queried at open time.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceInfo {
    /// Registry identity: the device node index on Linux. Stable for the
    /// endpoint's lifetime, not across runs.
    pub id: i32,
    /// The device node this endpoint was opened from.
    pub path: PathBuf,
    /// Kernel-reported device name; empty when the query fails.
    pub name: String,
    pub bustype: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

/// Predicate deciding whether an endpoint is captured.
///
/// Runs on whichever thread triggers the evaluation (the acquisition
/// thread for hotplug, the caller for
/// [`set_filter`][crate::Capture::set_filter]) and must not call back into
/// the capture API.
pub type Filter = Box<dyn Fn(&DeviceInfo) -> bool + Send + Sync>;

/// An open endpoint. The handle is shared so the acquisition thread can
/// keep reading a batch while a concurrent rescan closes the slot; the fd
/// is closed when the last holder lets go.
pub(crate) struct Device {
    pub file: Arc<File>,
    pub info: DeviceInfo,
}

/// Parses the numeric suffix of an `event*` node name.
pub(crate) fn node_index(name: &str) -> Option<i32> {
    let digits = name.strip_prefix("event")?;
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok().filter(|n| *n >= 0)
}

fn fill_info(file: &File, id: i32, path: &Path) -> DeviceInfo {
    let mut info = DeviceInfo {
        id,
        path: path.to_path_buf(),
        ..Default::default()
    };
    let mut raw = b::input_id::default();
    if syscall::ioctl_argp(file, b::EVIOCGID, &mut raw).is_ok() {
        info.bustype = raw.bustype;
        info.vendor = raw.vendor;
        info.product = raw.product;
        info.version = raw.version;
    }
    let mut name = [0u8; 256];
    if syscall::ioctl_argp(file, b::eviocgname(name.len() as u64), &mut name).is_ok() {
        let end = name.iter().position(|c| *c == 0).unwrap_or(name.len());
        info.name = String::from_utf8_lossy(&name[..end]).into_owned();
    }
    info
}

/// Opens a candidate node read-only, non-blocking, close-on-exec, queries
/// its identity and applies the user filter. `Ok(None)` means the filter
/// rejected it; the handle is already closed at that point.
pub(crate) fn open_filtered(path: &Path, filter: Option<&Filter>) -> io::Result<Option<Device>> {
    let id = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(node_index)
        .unwrap_or(-1);
    let file = syscall::open_nonblock(path)?;
    // Pin record timestamps to the monotonic clock. Endpoints that do not
    // speak evdev refuse; their records fall back to ingest-time stamps in
    // the same clock domain.
    let mut clock = libc::CLOCK_MONOTONIC as libc::c_int;
    let _ = syscall::ioctl_argp(&file, b::EVIOCSCLOCKID, &mut clock);
    let info = fill_info(&file, id, path);
    if let Some(filter) = filter {
        if !filter(&info) {
            return Ok(None);
        }
    }
    Ok(Some(Device {
        file: Arc::new(file),
        info,
    }))
}

/// Ordered set of open endpoints.
///
/// Slots carry a generation counter; the readiness payload is the pair, so
/// a wake-up resolves to its owner in O(1) and a wake-up raced by a
/// compacting removal resolves to nothing instead of to the slot's next
/// tenant.
pub(crate) struct Registry {
    slots: Vec<Slot>,
    count: usize,
}

struct Slot {
    gen: u32,
    dev: Option<Device>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            count: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn has(&self, id: i32) -> bool {
        self.iter().any(|(_, _, dev)| dev.info.id == id)
    }

    /// Claims a slot for the device. Returns its `(slot, generation)`
    /// discriminator, or `None` when the registry is full.
    pub fn insert(&mut self, dev: Device) -> Option<(u32, u32)> {
        if self.count >= MAX_DEVICES {
            return None;
        }
        self.count += 1;
        if let Some(i) = self.slots.iter().position(|s| s.dev.is_none()) {
            let slot = &mut self.slots[i];
            slot.gen = slot.gen.wrapping_add(1);
            slot.dev = Some(dev);
            Some((i as u32, slot.gen))
        } else {
            self.slots.push(Slot { gen: 0, dev: Some(dev) });
            Some((self.slots.len() as u32 - 1, 0))
        }
    }

    /// Resolves a discriminator. Stale generations yield `None`.
    pub fn get(&self, slot: u32, gen: u32) -> Option<&Device> {
        let slot = self.slots.get(slot as usize)?;
        if slot.gen != gen {
            return None;
        }
        slot.dev.as_ref()
    }

    /// Releases the slot holding the endpoint with this device id.
    pub fn remove(&mut self, id: i32) -> Option<Device> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.dev.as_ref().is_some_and(|d| d.info.id == id))?;
        self.count -= 1;
        slot.dev.take()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, &Device)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.dev.as_ref().map(|d| (i as u32, s.gen, d)))
    }

    /// Empties the registry, handing every endpoint back for teardown.
    pub fn drain(&mut self) -> Vec<Device> {
        self.count = 0;
        self.slots.iter_mut().filter_map(|s| s.dev.take()).collect()
    }
}
