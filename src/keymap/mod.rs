//! Optional translation of raw key scancodes into layout-aware key events.
//!
//! Compiled against libxkbcommon behind the `xkb` feature. Without the
//! feature every keymap operation fails with
//! [`Unsupported`][crate::Error::Unsupported].
//!
//! The compiled layout and its key/modifier state live on the acquisition
//! thread only. The API side publishes configuration through
//! [`KeymapCfg`] and bumps its epoch; the worker rebuilds its local state
//! on the next pass.

#[cfg(all(test, feature = "xkb"))]
mod test;

use crate::config::Names;
use crate::event::{Event, KeyEvent};

pub(crate) use imp::{compile, Keymap};

/// Shared keymap configuration. `epoch` changes whenever `enabled` or
/// `names` take effect.
#[derive(Clone, Debug, Default)]
pub(crate) struct KeymapCfg {
    pub enabled: bool,
    pub names: Names,
    pub epoch: u64,
}

/// Worker-local keymap state, rebuilt when the shared configuration moves.
pub(crate) struct Runtime {
    epoch: u64,
    map: Option<Keymap>,
}

impl Runtime {
    pub fn new() -> Self {
        Self { epoch: 0, map: None }
    }

    pub fn sync(&mut self, cfg: &KeymapCfg) {
        if cfg.epoch == self.epoch {
            return;
        }
        self.epoch = cfg.epoch;
        self.map = if cfg.enabled {
            match compile(&cfg.names) {
                Ok(map) => Some(map),
                // The API side validated the same names; losing a race with
                // e.g. a deleted layout file only disables translation.
                Err(e) => {
                    log::warn!("keymap rebuild failed: {e}");
                    None
                }
            }
        } else {
            None
        };
    }

    pub fn process(&mut self, ev: &Event) -> Option<KeyEvent> {
        self.map.as_mut().map(|map| map.process(ev))
    }
}

#[cfg(feature = "xkb")]
mod imp {
    use xkbcommon::xkb;

    use crate::config::Names;
    use crate::error::{Error, Result};
    use crate::event::{Event, KeyEvent, Mods};

    /// Offset between evdev scancodes and XKB keycodes.
    const EVDEV_OFFSET: u32 = 8;

    /// A compiled layout plus live key/modifier state.
    pub(crate) struct Keymap {
        state: xkb::State,
        _keymap: xkb::Keymap,
        _ctx: xkb::Context,
    }

    /// Compiles a keymap from RMLVO names.
    pub(crate) fn compile(names: &Names) -> Result<Keymap> {
        let ctx = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
        let keymap = xkb::Keymap::new_from_names(
            &ctx,
            &names.rules,
            &names.model,
            &names.layout,
            &names.variant,
            if names.options.is_empty() {
                None
            } else {
                Some(names.options.clone())
            },
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )
        .ok_or(Error::InvalidArgument("keymap names did not compile"))?;
        let state = xkb::State::new(&keymap);
        Ok(Keymap {
            state,
            _keymap: keymap,
            _ctx: ctx,
        })
    }

    impl Keymap {
        /// Feeds one raw KEY event through the layout: update held-key
        /// state, resolve the keysym for the primary group, produce UTF-8
        /// text on key-down and snapshot the modifiers.
        pub(crate) fn process(&mut self, ev: &Event) -> KeyEvent {
            let code = xkb::Keycode::new(ev.code as u32 + EVDEV_OFFSET);
            let down = ev.value != 0;
            // Autorepeat (value >= 2) keeps the key held; feeding it as
            // another down would wedge latched modifiers.
            if ev.value < 2 {
                let direction = if down {
                    xkb::KeyDirection::Down
                } else {
                    xkb::KeyDirection::Up
                };
                self.state.update_key(code, direction);
            }
            let mut out = KeyEvent {
                device_id: ev.device_id,
                time_ns: ev.time_ns,
                down,
                keysym: self.state.key_get_one_sym(code).raw(),
                mods: self.mods(),
                text: Default::default(),
            };
            if down {
                let text = self.state.key_get_utf8(code);
                if !text.is_empty() && !text.chars().any(|c| c.is_control()) {
                    // Text longer than the fixed field is dropped, not cut
                    // mid-character.
                    let _ = out.text.try_push_str(&text);
                }
            }
            out
        }

        fn mods(&self) -> Mods {
            let pairs = [
                (xkb::MOD_NAME_SHIFT, Mods::SHIFT),
                (xkb::MOD_NAME_CTRL, Mods::CTRL),
                (xkb::MOD_NAME_ALT, Mods::ALT),
                (xkb::MOD_NAME_LOGO, Mods::LOGO),
            ];
            let mut mods = Mods::empty();
            for (name, flag) in pairs {
                if self
                    .state
                    .mod_name_is_active(name, xkb::STATE_MODS_EFFECTIVE)
                {
                    mods |= flag;
                }
            }
            mods
        }
    }
}

#[cfg(not(feature = "xkb"))]
mod imp {
    use crate::config::Names;
    use crate::error::{Error, Result};
    use crate::event::{Event, KeyEvent};

    /// Placeholder for builds without a keymap provider; cannot be
    /// constructed.
    pub(crate) struct Keymap {}

    pub(crate) fn compile(_names: &Names) -> Result<Keymap> {
        Err(Error::Unsupported)
    }

    impl Keymap {
        pub(crate) fn process(&mut self, _ev: &Event) -> KeyEvent {
            // No constructor exists in this configuration.
            unreachable!()
        }
    }
}
