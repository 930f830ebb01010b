//! Process-default capture instance.
//!
//! A convenience layer over [`Capture`] for programs that want exactly one
//! capture per process without threading a handle around. [`init`] starts
//! it, [`shutdown`] stops it, and every other function fails with
//! [`Error::NotInitialized`] outside that window. `init` after `init` and
//! `shutdown` after `shutdown` are no-ops.


use std::sync::Mutex;

use crate::capture::Capture;
use crate::config::{Names, Opts};
use crate::device::DeviceInfo;
use crate::error::{Error, Result};
use crate::event::{Event, KeyEvent};

static INSTANCE: Mutex<Option<Capture>> = Mutex::new(None);

/// Starts the process-default capture with default options. Idempotent:
/// a second call while running succeeds and changes nothing.
pub fn init() -> Result<()> {
    init_with(Opts::default())
}

/// Starts the process-default capture. If one is already running the
/// options are ignored and the call succeeds.
pub fn init_with(opts: Opts) -> Result<()> {
    let mut instance = INSTANCE.lock().unwrap();
    if instance.is_none() {
        *instance = Some(Capture::new(opts)?);
    }
    Ok(())
}

/// Stops the process-default capture and closes every endpoint.
/// Idempotent.
pub fn shutdown() -> Result<()> {
    let mut instance = INSTANCE.lock().unwrap();
    if let Some(mut capture) = instance.take() {
        capture.shutdown();
    }
    Ok(())
}

fn with<R>(f: impl FnOnce(&Capture) -> Result<R>) -> Result<R> {
    let instance = INSTANCE.lock().unwrap();
    match instance.as_ref() {
        Some(capture) => f(capture),
        None => Err(Error::NotInitialized),
    }
}

/// [`Capture::poll`] on the process-default instance.
pub fn poll(out: &mut [Event]) -> Result<usize> {
    with(|c| c.poll(out))
}

/// [`Capture::poll_keys`] on the process-default instance.
pub fn poll_keys(out: &mut [KeyEvent]) -> Result<usize> {
    with(|c| c.poll_keys(out))
}

/// [`Capture::device_count`] on the process-default instance.
pub fn device_count() -> Result<usize> {
    with(|c| Ok(c.device_count()))
}

/// [`Capture::set_filter`] on the process-default instance.
pub fn set_filter<F>(filter: F) -> Result<()>
where
    F: Fn(&DeviceInfo) -> bool + Send + Sync + 'static,
{
    with(|c| {
        c.set_filter(filter);
        Ok(())
    })
}

/// [`Capture::clear_filter`] on the process-default instance.
pub fn clear_filter() -> Result<()> {
    with(|c| {
        c.clear_filter();
        Ok(())
    })
}

/// [`Capture::register_callback`] on the process-default instance.
pub fn register_callback<F>(callback: F) -> Result<()>
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    with(|c| {
        c.register_callback(callback);
        Ok(())
    })
}

/// [`Capture::clear_callback`] on the process-default instance.
pub fn clear_callback() -> Result<()> {
    with(|c| {
        c.clear_callback();
        Ok(())
    })
}

/// [`Capture::register_key_callback`] on the process-default instance.
pub fn register_key_callback<F>(callback: F) -> Result<()>
where
    F: Fn(&KeyEvent) + Send + Sync + 'static,
{
    with(|c| {
        c.register_key_callback(callback);
        Ok(())
    })
}

/// [`Capture::clear_key_callback`] on the process-default instance.
pub fn clear_key_callback() -> Result<()> {
    with(|c| {
        c.clear_key_callback();
        Ok(())
    })
}

/// [`Capture::enable_keymap`] on the process-default instance.
pub fn enable_keymap(enabled: bool) -> Result<()> {
    with(|c| c.enable_keymap(enabled))
}

/// [`Capture::set_keymap_names`] on the process-default instance.
pub fn set_keymap_names(names: Names) -> Result<()> {
    with(|c| c.set_keymap_names(names))
}

/// [`Capture::enable_mice`] on the process-default instance.
pub fn enable_mice(enabled: bool) -> Result<()> {
    with(|c| c.enable_mice(enabled))
}
