pub mod codes;

use arrayvec::ArrayString;
use bitflags::bitflags;

/// A normalized input event.
///
/// `ty` and `code` alias the native evdev encoding verbatim (see
/// [`codes`]), so translating a kernel record is a field-for-field move.
/// `value` is 0/1 (and ≥ 2 for autorepeat) for [`codes::EV_KEY`], a signed
/// delta for [`codes::EV_REL`] and an absolute sample for
/// [`codes::EV_ABS`].
///
/// `x`, `y` and `extra` are only populated on the unified
/// [`codes::EV_MOUSE`] variant emitted by the aggregated legacy pointer
/// reader.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    /// Registry identity of the originating endpoint. Stable for the
    /// endpoint's lifetime, not across runs.
    /// [`codes::MICE_DEVICE_ID`] marks the aggregated legacy pointer.
    pub device_id: i32,
    /// Event type, one of the `EV_*` constants.
    pub ty: u16,
    /// Type-dependent selector: key scancode, relative/absolute axis, …
    pub code: u16,
    pub value: i32,
    pub x: i32,
    pub y: i32,
    pub extra: i32,
    /// Origin timestamp in nanoseconds, `CLOCK_MONOTONIC` domain.
    ///
    /// Taken from the kernel record when the record carries one, otherwise
    /// sampled at ingest. Monotone per `device_id`; not comparable across
    /// devices without care.
    pub time_ns: i64,
}

bitflags! {
    /// Modifier snapshot carried on [`KeyEvent`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Mods: u32 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
        const LOGO = 1 << 3;
    }
}

/// A layout-aware key event produced by the keymap layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyEvent {
    /// Inherited from the originating raw event.
    pub device_id: i32,
    /// Inherited from the originating raw event.
    pub time_ns: i64,
    pub down: bool,
    /// Layout-resolved keysym for the primary group.
    pub keysym: u32,
    /// Modifier state effective at this event.
    pub mods: Mods,
    /// UTF-8 text. Non-empty only on key-down and only when the key
    /// resolves to printable output.
    pub text: ArrayString<32>,
}
