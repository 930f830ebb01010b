#[cfg(test)]
mod test;

use std::fs::File;
use std::io;
use std::path::Path;

use crate::device::node_index;
use crate::ffi::syscall;

/// Registry mutation requested by the device-node namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Change {
    /// An `event*` node appeared, created or renamed into place by the
    /// device manager. Try to open and add it.
    Added(String),
    /// An `event*` node vanished. The id is derived from the node name.
    Removed(i32),
}

/// Watches the device directory for endpoint add/remove.
///
/// Device managers may create a node, settle its permissions and then
/// rename it, so MOVED_TO counts as creation and a failed open after a
/// CREATE is worth retrying for a while (the worker's rescan window).
pub(crate) struct Hotplug {
    inot: File,
}

impl Hotplug {
    pub fn new(dir: &Path) -> io::Result<Self> {
        let inot = syscall::inotify_init1(libc::IN_NONBLOCK | libc::IN_CLOEXEC)?;
        syscall::inotify_add_watch(&inot, dir, libc::IN_CREATE | libc::IN_MOVED_TO | libc::IN_DELETE)?;
        Ok(Self { inot })
    }

    pub fn file(&self) -> &File {
        &self.inot
    }

    /// Drains pending notifications. A read error ends the drain; the next
    /// readiness wake-up retries.
    pub fn drain(&self) -> Vec<Change> {
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            match syscall::read(&self.inot, &mut buf) {
                Ok(0) => break,
                Ok(n) => parse_events(&buf[..n], &mut out),
                Err(e) => {
                    if e.kind() != io::ErrorKind::WouldBlock {
                        log::debug!("hotplug drain failed: {e}");
                    }
                    break;
                }
            }
        }
        out
    }
}

/// Walks a raw inotify record buffer: a fixed header (wd, mask, cookie,
/// len) followed by `len` bytes of nul-padded name per record. Names that
/// are not `event*` nodes are skipped.
pub(crate) fn parse_events(mut buf: &[u8], out: &mut Vec<Change>) {
    const HDR: usize = 16;
    while buf.len() >= HDR {
        let mask = u32::from_ne_bytes(buf[4..8].try_into().unwrap());
        let len = u32::from_ne_bytes(buf[12..16].try_into().unwrap()) as usize;
        if buf.len() < HDR + len {
            break;
        }
        let name = &buf[HDR..HDR + len];
        let name = &name[..name.iter().position(|c| *c == 0).unwrap_or(name.len())];
        if let Ok(name) = std::str::from_utf8(name) {
            if let Some(id) = node_index(name) {
                if mask & (libc::IN_CREATE | libc::IN_MOVED_TO) != 0 {
                    out.push(Change::Added(name.to_owned()));
                } else if mask & libc::IN_DELETE != 0 {
                    out.push(Change::Removed(id));
                }
            }
        }
        buf = &buf[HDR + len..];
    }
}
