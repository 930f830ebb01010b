//! Aggregated legacy pointer reader.
//!
//! `<dir>/mice` multiplexes every pointing device into one byte stream
//! speaking the legacy 3-byte protocol: a button byte, then signed dx and
//! dy (Y-up). The node does not speak evdev, so it cannot share the
//! acquisition loop; a second, dedicated thread reads it and publishes
//! under [`codes::MICE_DEVICE_ID`]. A pointer that is also open as an
//! evdev endpoint will therefore report under two device ids while this
//! reader runs.


use std::io::ErrorKind;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::capture::Shared;
use crate::event::{codes, Event};
use crate::ffi::syscall;

/// Stateful decoder for the legacy pointer protocol.
///
/// Three-byte packets; `wheel` switches to the four-byte variant whose
/// trailing byte is a signed wheel step. Button bits are tracked so a
/// transition is emitted once, not re-reported every packet.
pub(crate) struct PacketDecoder {
    pkt: [u8; 4],
    have: usize,
    packet_len: usize,
    buttons: u8,
}

impl PacketDecoder {
    pub fn new(wheel: bool) -> Self {
        Self {
            pkt: [0; 4],
            have: 0,
            packet_len: if wheel { 4 } else { 3 },
            buttons: 0,
        }
    }

    /// Feeds raw stream bytes and appends decoded events: button
    /// transitions, relative motion, then the unified mouse variants.
    pub fn feed(&mut self, bytes: &[u8], time_ns: i64, out: &mut Vec<Event>) {
        for &byte in bytes {
            self.pkt[self.have] = byte;
            self.have += 1;
            if self.have == self.packet_len {
                self.have = 0;
                self.packet(time_ns, out);
            }
        }
    }

    fn packet(&mut self, time_ns: i64, out: &mut Vec<Event>) {
        let btn = self.pkt[0];
        let dx = self.pkt[1] as i8 as i32;
        // The byte stream is Y-up; the event space is Y-down.
        let dy = -(self.pkt[2] as i8 as i32);
        let base = Event {
            device_id: codes::MICE_DEVICE_ID,
            time_ns,
            ..Default::default()
        };

        let pairs = [
            (0x1u8, codes::BTN_LEFT, 1),
            (0x2, codes::BTN_RIGHT, 2),
            (0x4, codes::BTN_MIDDLE, 3),
        ];
        for (bit, code, index) in pairs {
            let down = btn & bit != 0;
            if down == (self.buttons & bit != 0) {
                continue;
            }
            out.push(Event {
                ty: codes::EV_KEY,
                code,
                value: down as i32,
                ..base
            });
            out.push(Event {
                ty: codes::EV_MOUSE,
                code: codes::MOUSE_BUTTON,
                value: down as i32,
                extra: index,
                ..base
            });
        }
        self.buttons = btn & 0x7;

        if dx != 0 {
            out.push(Event {
                ty: codes::EV_REL,
                code: codes::REL_X,
                value: dx,
                ..base
            });
        }
        if dy != 0 {
            out.push(Event {
                ty: codes::EV_REL,
                code: codes::REL_Y,
                value: dy,
                ..base
            });
        }
        if dx != 0 || dy != 0 {
            out.push(Event {
                ty: codes::EV_MOUSE,
                code: codes::MOUSE_MOVE,
                x: dx,
                y: dy,
                ..base
            });
        }

        if self.packet_len == 4 {
            let dz = self.pkt[3] as i8 as i32;
            if dz != 0 {
                out.push(Event {
                    ty: codes::EV_REL,
                    code: codes::REL_WHEEL,
                    value: dz,
                    ..base
                });
                out.push(Event {
                    ty: codes::EV_MOUSE,
                    code: codes::MOUSE_WHEEL,
                    value: dz,
                    ..base
                });
            }
        }
    }
}

/// Entry point of the legacy pointer thread.
pub(crate) fn run(shared: Arc<Shared>) {
    let path = shared.dir.join("mice");
    let file = match syscall::open_nonblock(&path) {
        Ok(file) => file,
        Err(e) => {
            log::warn!("legacy pointer node {} unavailable: {e}", path.display());
            return;
        }
    };
    let mut decoder = PacketDecoder::new(false);
    let mut buf = [0u8; 8];
    let mut events = Vec::with_capacity(16);
    while !shared.stop.load(Ordering::Acquire) && shared.mice_enabled.load(Ordering::Acquire) {
        match syscall::read(&file, &mut buf) {
            Ok(0) => break,
            Ok(n) => {
                events.clear();
                decoder.feed(&buf[..n], syscall::now_ns(), &mut events);
                for ev in &events {
                    shared.publish_raw(ev);
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(1));
            }
            Err(e) => {
                log::debug!("legacy pointer read failed: {e}");
                break;
            }
        }
    }
}
