//! evdev ABI surface.
//!
//! The record layout and the `EVIOC*` requests are frozen kernel ABI
//! (`include/uapi/linux/input.h`), aliased here directly.

#![allow(non_camel_case_types)]

/// One kernel input record as read from an `event*` node.
// struct input_event {
//     struct timeval time;
//     __u16 type;
//     __u16 code;
//     __s32 value;
// };
#[repr(C)]
#[derive(Clone, Copy)]
pub struct input_event {
    pub time: libc::timeval,
    pub type_: u16,
    pub code: u16,
    pub value: i32,
}

/// Device identity block returned by `EVIOCGID`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct input_id {
    pub bustype: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

// _IOC composition, asm-generic layout.
const IOC_WRITE: u64 = 1;
const IOC_READ: u64 = 2;

const fn ioc(dir: u64, ty: u64, nr: u64, size: u64) -> u64 {
    (dir << 30) | (size << 16) | (ty << 8) | nr
}

/// `EVIOCGID`: read the [`input_id`] block.
pub const EVIOCGID: u64 = ioc(IOC_READ, b'E' as u64, 0x02, size_of::<input_id>() as u64);

/// `EVIOCGNAME(len)`: read the device name into a `len`-byte buffer.
pub const fn eviocgname(len: u64) -> u64 {
    ioc(IOC_READ, b'E' as u64, 0x06, len)
}

/// `EVIOCSCLOCKID`: select the clock stamping this device's records.
pub const EVIOCSCLOCKID: u64 = ioc(IOC_WRITE, b'E' as u64, 0xa0, size_of::<libc::c_int>() as u64);
