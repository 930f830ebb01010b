use std::io::ErrorKind;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use arrayvec::ArrayVec;
use libc::epoll_event;

use crate::capture::Shared;
use crate::event::Event;
use crate::ffi::{bindings as b, syscall, RAW_EVENT_SIZE};
use crate::keymap;
use crate::poller::{Token, MAX_READY, WAIT_MS};

/// Entry point of the acquisition thread.
///
/// One loop iteration: run a rescan pass if the hotplug window is armed,
/// wait on the multiplexer, then dispatch each ready token. The hotplug
/// sentinel drains the notifier and mutates the registry; a device token
/// drains that endpoint. User callbacks run here, synchronously.
pub(crate) fn run(shared: Arc<Shared>) {
    let mut ready = [epoll_event { events: 0, u64: 0 }; MAX_READY];
    let mut keymap = keymap::Runtime::new();

    while !shared.stop.load(Ordering::Acquire) {
        shared.rescan_pass();

        let tokens: ArrayVec<u64, MAX_READY> = match shared.poller.wait(&mut ready, WAIT_MS) {
            Ok(evs) => evs.iter().map(|ev| ev.u64).collect(),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                log::warn!("readiness wait failed: {e}");
                continue;
            }
        };

        // Pick up keymap reconfiguration before dispatching this batch, so
        // events published after an enable see the new layout.
        keymap.sync(&shared.keymap_cfg.lock().unwrap());

        for raw in tokens {
            match Token::decode(raw) {
                Token::Hotplug => shared.apply_hotplug(),
                Token::Device { slot, gen } => drain_endpoint(&shared, slot, gen, &mut keymap),
            }
        }
    }
}

/// Reads an endpoint until it would block, publishing each record.
///
/// The handle is cloned out of the registry so reads and user callbacks run
/// outside the registry lock; a filter rescan may close the slot meanwhile
/// and the fd lives until this batch finishes. On a terminal read condition
/// the endpoint is detached from the multiplexer but stays registered;
/// the hotplug DELETE that follows is the authoritative removal.
fn drain_endpoint(shared: &Shared, slot: u32, gen: u32, keymap: &mut keymap::Runtime) {
    let (file, device_id) = {
        let reg = shared.registry.lock().unwrap();
        match reg.get(slot, gen) {
            Some(dev) => (Arc::clone(&dev.file), dev.info.id),
            // Stale wake-up: the slot moved on since epoll queued this.
            None => return,
        }
    };

    let mut raw = [0u8; RAW_EVENT_SIZE];
    loop {
        match syscall::read(&file, &mut raw) {
            Ok(n) if n == RAW_EVENT_SIZE => {
                let ev = normalize(device_id, &raw);
                shared.publish(&ev, keymap);
            }
            Ok(_) => {
                // EOF or a short read: not a live evdev stream.
                shared.detach(slot, gen);
                break;
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) => {
                log::debug!("device {device_id} read failed: {e}");
                shared.detach(slot, gen);
                break;
            }
        }
    }
}

/// Turns one kernel record into a core event. The kernel timestamp is kept
/// verbatim; a record without one is stamped at ingest from the same
/// monotonic clock.
fn normalize(device_id: i32, raw: &[u8; RAW_EVENT_SIZE]) -> Event {
    // A fully read record of exactly this size; input_event is plain data.
    let rec: b::input_event = unsafe { std::ptr::read_unaligned(raw.as_ptr() as *const _) };
    let time_ns = match (rec.time.tv_sec, rec.time.tv_usec) {
        (0, 0) => syscall::now_ns(),
        (s, u) => s as i64 * 1_000_000_000 + u as i64 * 1_000,
    };
    Event {
        device_id,
        ty: rec.type_,
        code: rec.code,
        value: rec.value,
        time_ns,
        ..Default::default()
    }
}
