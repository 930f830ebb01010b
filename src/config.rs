use std::path::PathBuf;

use crate::error::{Error, Result};

/// Capture options.
///
/// The defaults match the reference setup: `/dev/input`, 1024-slot queues,
/// keymap layer and legacy pointer reader off.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Opts {
    /// Directory scanned and watched for `event*` device nodes.
    pub dir: PathBuf,

    /// Queue capacity exponent: the raw and key queues each allocate
    /// `2^ring_exp` slots. Accepted range is 1..=16.
    pub ring_exp: u8,

    /// XKB rule names used when the keymap layer is enabled.
    pub keymap: Names,

    /// Start with the keymap layer enabled.
    ///
    /// Requires the `xkb` feature; construction fails with
    /// [`Error::Unsupported`][crate::Error::Unsupported] otherwise.
    pub enable_keymap: bool,

    /// Start the aggregated legacy pointer reader (see
    /// [`Capture::enable_mice`][crate::Capture::enable_mice]).
    pub enable_mice: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/dev/input"),
            ring_exp: 10,
            keymap: Names::default(),
            enable_keymap: false,
            enable_mice: false,
        }
    }
}

impl Opts {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.ring_exp == 0 || self.ring_exp > 16 {
            return Err(Error::InvalidArgument("ring_exp out of range 1..=16"));
        }
        self.keymap.validate()
    }
}

/// XKB RMLVO names (rules, model, layout, variant, options) selecting the
/// keymap the layout layer compiles.
///
/// Empty strings select the library default for that component, except
/// `options` where empty means no options.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Names {
    pub rules: String,
    pub model: String,
    pub layout: String,
    pub variant: String,
    pub options: String,
}

impl Default for Names {
    fn default() -> Self {
        Self {
            rules: "evdev".into(),
            model: "pc105".into(),
            layout: "us".into(),
            variant: String::new(),
            options: String::new(),
        }
    }
}

impl Names {
    pub(crate) fn validate(&self) -> Result<()> {
        let fields = [&self.rules, &self.model, &self.layout, &self.variant, &self.options];
        if fields.iter().any(|s| s.contains('\0')) {
            return Err(Error::InvalidArgument("keymap names must not contain nul bytes"));
        }
        Ok(())
    }
}
