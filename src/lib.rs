//! Asynchronous capture of Linux input events.
//!
//! This crate reads keyboard and pointing-device events straight from the
//! evdev device nodes, on a single background thread, independent of any
//! windowing system or main-loop architecture. Device endpoints are tracked
//! dynamically: nodes that appear, get renamed by the device manager or
//! vanish are picked up while the capture runs.
//!
//! Events can be consumed three ways:
//!
//! - a callback invoked synchronously on the acquisition thread
//!   ([`Capture::register_callback`]): the zero-copy path; the callback
//!   runs inside the producer and must not block,
//! - a bounded non-blocking poll queue ([`Capture::poll`]): when the queue
//!   is full the *newest* event is dropped, so a consumer that lags sees
//!   the events that were fresh when it last kept up,
//! - an asynchronous iterator over the same queue ([`Capture::events`]).
//!
//! The optional `xkb` feature adds a keymap layer translating raw key
//! scancodes into layout-aware [`KeyEvent`]s with modifier state and UTF-8
//! text.
//!
//! ## Example
//!
//! ```no_run
//! use input_capture::{Capture, Event, Opts};
//!
//! let capture = Capture::new(Opts::default()).unwrap();
//!
//! // Keep only keyboards named like keyboards.
//! capture.set_filter(|info| info.name.to_lowercase().contains("keyboard"));
//!
//! let mut buf = [Event::default(); 64];
//! loop {
//!     let n = capture.poll(&mut buf).unwrap();
//!     for ev in &buf[..n] {
//!         println!("device {} type {} code {} value {}", ev.device_id, ev.ty, ev.code, ev.value);
//!     }
//! }
//! ```
//!
//! ## Timestamps
//!
//! [`Event::time_ns`] carries the origin timestamp: the time the kernel
//! stamped the record, not the time this library read it. Endpoints are
//! pinned to `CLOCK_MONOTONIC` at open time and the ingest-time fallback
//! samples the same clock, so latency math against
//! `clock_gettime(CLOCK_MONOTONIC)` is meaningful either way. Timestamps
//! are monotone per device; no ordering is guaranteed across devices.
//!
//! ## Permission
//!
//! Reading `/dev/input` requires membership in the `input` group (or root)
//! on most distributions. Nodes that cannot be opened are skipped and
//! retried when the device manager touches them.

#[cfg(not(any(target_os = "linux", target_os = "android")))]
compile_error!("input-capture targets the Linux evdev interface; no backend exists for this platform");

pub mod capture;
pub mod config;
pub mod device;
mod error;
pub mod event;
mod ffi;
pub mod global;
mod hotplug;
mod keymap;
mod mice;
mod poller;
mod ring;
mod worker;

pub use capture::{Capture, EventStream};
pub use config::{Names, Opts};
pub use device::DeviceInfo;
pub use error::{Error, Result};
pub use event::{codes, Event, KeyEvent, Mods};
