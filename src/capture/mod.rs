#[cfg(test)]
mod test;

mod iter;

pub use iter::EventStream;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;

use crate::config::{Names, Opts};
use crate::device::{self, DeviceInfo, Filter, Registry};
use crate::error::{Error, Result};
use crate::event::{codes, Event, KeyEvent};
use crate::ffi::syscall;
use crate::hotplug::{Change, Hotplug};
use crate::keymap::{self, KeymapCfg};
use crate::mice;
use crate::poller::{Poller, Token};
use crate::ring::Ring;
use crate::worker;

pub(crate) type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;
pub(crate) type KeyCallback = Arc<dyn Fn(&KeyEvent) + Send + Sync>;

/// How long a failed hotplug open keeps full rescans armed. Device
/// managers create nodes, settle permissions, then sometimes rename them;
/// scanning for a while covers the whole sequence without sleeping.
const RESCAN_WINDOW_NS: i64 = 3_000_000_000;

/// State shared between the API surface and the worker threads.
pub(crate) struct Shared {
    pub dir: PathBuf,
    pub stop: AtomicBool,
    pub poller: Poller,
    pub hotplug: Option<Hotplug>,
    pub registry: Mutex<Registry>,
    pub filter: Mutex<Option<Filter>>,
    /// Rescan-window deadline in monotonic nanoseconds; 0 = disarmed.
    pub rescan_until: AtomicI64,
    pub events: Ring<Event>,
    pub keys: Ring<KeyEvent>,
    pub cb: RwLock<Option<EventCallback>>,
    pub key_cb: RwLock<Option<KeyCallback>>,
    pub keymap_cfg: Mutex<KeymapCfg>,
    pub mice_enabled: AtomicBool,
}

impl Shared {
    /// Hands an event to the raw sink: the callback when one is set,
    /// otherwise the poll queue. The queue never sees callback traffic.
    pub(crate) fn publish_raw(&self, ev: &Event) {
        let cb = self.cb.read().unwrap().clone();
        match cb {
            Some(cb) => cb(ev),
            None => {
                self.events.push(*ev);
            }
        }
    }

    /// Publishes a normalized event and, for key events, feeds the keymap
    /// layer and its own sink.
    pub(crate) fn publish(&self, ev: &Event, keymap: &mut keymap::Runtime) {
        self.publish_raw(ev);
        if ev.ty != codes::EV_KEY {
            return;
        }
        if let Some(kev) = keymap.process(ev) {
            let cb = self.key_cb.read().unwrap().clone();
            match cb {
                Some(cb) => cb(&kev),
                None => {
                    self.keys.push(kev);
                }
            }
        }
    }

    /// One full enumeration of the device directory; returns how many
    /// endpoints were added.
    pub(crate) fn scan(&self) -> io::Result<usize> {
        let mut added = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let Ok(entry) = entry else { continue };
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(id) = device::node_index(name) else {
                continue;
            };
            {
                let reg = self.registry.lock().unwrap();
                if reg.has(id) {
                    continue;
                }
            }
            if self.add_device(&entry.path()) {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Opens, filters and attaches one candidate node. `false` when the
    /// node could not be opened, was rejected, or could not be watched.
    pub(crate) fn add_device(&self, path: &Path) -> bool {
        let dev = {
            let filter = self.filter.lock().unwrap();
            match device::open_filtered(path, filter.as_ref()) {
                Ok(Some(dev)) => dev,
                Ok(None) => return false,
                Err(e) => {
                    log::debug!("skipping {}: {e}", path.display());
                    return false;
                }
            }
        };
        let id = dev.info.id;
        let file = Arc::clone(&dev.file);
        let mut reg = self.registry.lock().unwrap();
        if reg.has(id) {
            // Raced with another add path; the extra handle just closes.
            return false;
        }
        let Some((slot, gen)) = reg.insert(dev) else {
            log::warn!("device table full, ignoring {}", path.display());
            return false;
        };
        if let Err(e) = self.poller.add(&file, Token::Device { slot, gen }) {
            log::warn!("cannot watch {}: {e}", path.display());
            reg.remove(id);
            return false;
        }
        true
    }

    /// Removes the endpoint with this device id: detach, then close.
    pub(crate) fn remove_device(&self, id: i32) {
        let mut reg = self.registry.lock().unwrap();
        if let Some(dev) = reg.remove(id) {
            // May already be detached after a terminal read error.
            let _ = self.poller.del(&dev.file);
        }
    }

    /// Stops watching an endpoint without unregistering it.
    pub(crate) fn detach(&self, slot: u32, gen: u32) {
        let reg = self.registry.lock().unwrap();
        if let Some(dev) = reg.get(slot, gen) {
            let _ = self.poller.del(&dev.file);
        }
    }

    /// Drains the hotplug notifier and applies the registry mutations.
    pub(crate) fn apply_hotplug(&self) {
        let Some(hotplug) = &self.hotplug else { return };
        for change in hotplug.drain() {
            match change {
                Change::Added(name) => {
                    let path = self.dir.join(&name);
                    if !self.add_device(&path) {
                        self.rescan_until
                            .store(syscall::now_ns() + RESCAN_WINDOW_NS, Ordering::Release);
                    }
                }
                Change::Removed(id) => self.remove_device(id),
            }
        }
    }

    /// Runs a scan when inside an armed rescan window. A scan that adds
    /// something ends the window; otherwise it stays armed until the
    /// deadline passes.
    pub(crate) fn rescan_pass(&self) {
        let until = self.rescan_until.load(Ordering::Acquire);
        if until == 0 || syscall::now_ns() >= until {
            return;
        }
        match self.scan() {
            Ok(added) if added > 0 => self.rescan_until.store(0, Ordering::Release),
            Ok(_) => {}
            Err(e) => log::debug!("rescan failed: {e}"),
        }
    }

    /// Installs a filter and reconciles the registry against it: open
    /// endpoints the filter rejects are removed, candidates it now accepts
    /// are opened.
    pub(crate) fn set_filter(&self, filter: Option<Filter>) {
        *self.filter.lock().unwrap() = filter;
        self.refilter();
        if let Err(e) = self.scan() {
            log::debug!("filter rescan failed: {e}");
        }
    }

    fn refilter(&self) {
        let filter = self.filter.lock().unwrap();
        let mut reg = self.registry.lock().unwrap();
        let rejected: Vec<i32> = reg
            .iter()
            .filter(|(_, _, dev)| filter.as_ref().is_some_and(|f| !f(&dev.info)))
            .map(|(_, _, dev)| dev.info.id)
            .collect();
        for id in rejected {
            if let Some(dev) = reg.remove(id) {
                let _ = self.poller.del(&dev.file);
            }
        }
    }
}

/// An input capture context: the device registry, the readiness
/// multiplexer, the hotplug monitor and exactly one acquisition thread.
///
/// Dropping the context shuts it down: the worker is signalled, joined
/// (within one multiplexer timeout, ~50 ms) and every endpoint is closed.
///
/// Callbacks registered here run *on the acquisition thread* and
/// contribute to producer latency; they must not block and must not call
/// back into this API. The poll queues are the safe path.
pub struct Capture {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    mice_worker: Mutex<Option<JoinHandle<()>>>,
}

impl Capture {
    /// Opens every matching endpoint under `opts.dir` and starts the
    /// acquisition thread.
    ///
    /// Construction is atomic: on error everything already opened is torn
    /// down before returning.
    pub fn new(opts: Opts) -> Result<Self> {
        opts.validate()?;

        let poller = Poller::new().map_err(Error::resource)?;
        let hotplug = match Hotplug::new(&opts.dir) {
            Ok(hotplug) => Some(hotplug),
            Err(e) => {
                log::warn!(
                    "hotplug monitoring unavailable for {}: {e}",
                    opts.dir.display()
                );
                None
            }
        };
        if let Some(hotplug) = &hotplug {
            poller
                .add(hotplug.file(), Token::Hotplug)
                .map_err(Error::resource)?;
        }

        let shared = Arc::new(Shared {
            dir: opts.dir,
            stop: AtomicBool::new(false),
            poller,
            hotplug,
            registry: Mutex::new(Registry::new()),
            filter: Mutex::new(None),
            rescan_until: AtomicI64::new(0),
            events: Ring::with_exp(opts.ring_exp),
            keys: Ring::with_exp(opts.ring_exp),
            cb: RwLock::new(None),
            key_cb: RwLock::new(None),
            keymap_cfg: Mutex::new(KeymapCfg {
                enabled: false,
                names: opts.keymap,
                epoch: 0,
            }),
            mice_enabled: AtomicBool::new(false),
        });

        if opts.enable_keymap {
            let mut cfg = shared.keymap_cfg.lock().unwrap();
            // Validates the names here; the worker compiles its own copy.
            keymap::compile(&cfg.names)?;
            cfg.enabled = true;
            cfg.epoch += 1;
        }

        shared.scan().map_err(Error::resource)?;

        let handle = std::thread::Builder::new()
            .name("input-capture".into())
            .spawn({
                let shared = Arc::clone(&shared);
                move || worker::run(shared)
            })
            .map_err(Error::resource)?;

        let capture = Self {
            shared,
            worker: Some(handle),
            mice_worker: Mutex::new(None),
        };
        if opts.enable_mice {
            capture.enable_mice(true)?;
        }
        Ok(capture)
    }

    /// Drains up to `out.len()` queued raw events without blocking.
    /// Returns how many were written to the front of `out`.
    ///
    /// While a raw callback is registered the queue receives nothing, so
    /// this returns 0.
    pub fn poll(&self, out: &mut [Event]) -> Result<usize> {
        if out.is_empty() {
            return Err(Error::InvalidArgument("empty event buffer"));
        }
        Ok(self.shared.events.pop_many(out))
    }

    /// Drains up to `out.len()` queued key events without blocking.
    pub fn poll_keys(&self, out: &mut [KeyEvent]) -> Result<usize> {
        if out.is_empty() {
            return Err(Error::InvalidArgument("empty event buffer"));
        }
        Ok(self.shared.keys.pop_many(out))
    }

    /// Asynchronous iterator over the raw event queue. Single consumer:
    /// this, [`poll`][Self::poll] and further streams all drain the same
    /// queue.
    pub fn events(&self) -> EventStream<'_, Event> {
        EventStream::new(&self.shared.events)
    }

    /// Asynchronous iterator over the key event queue.
    pub fn key_events(&self) -> EventStream<'_, KeyEvent> {
        EventStream::new(&self.shared.keys)
    }

    /// Number of currently open endpoints.
    pub fn device_count(&self) -> usize {
        self.shared.registry.lock().unwrap().count()
    }

    /// Installs a device filter and rescans: open endpoints the predicate
    /// rejects are closed, previously rejected nodes are re-evaluated.
    ///
    /// The predicate also runs on the acquisition thread for hotplugged
    /// nodes; it must not call back into this API.
    pub fn set_filter<F>(&self, filter: F)
    where
        F: Fn(&DeviceInfo) -> bool + Send + Sync + 'static,
    {
        self.shared.set_filter(Some(Box::new(filter)));
    }

    /// Removes the device filter and re-opens everything that qualifies.
    pub fn clear_filter(&self) {
        self.shared.set_filter(None);
    }

    /// Installs the raw-event sink. While set, the poll queue is bypassed
    /// and each event is delivered to the callback exactly once, on the
    /// acquisition thread.
    pub fn register_callback<F>(&self, callback: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        *self.shared.cb.write().unwrap() = Some(Arc::new(callback));
    }

    /// Reverts raw-event delivery to the poll queue.
    pub fn clear_callback(&self) {
        *self.shared.cb.write().unwrap() = None;
    }

    /// Installs the key-event sink; same contract as
    /// [`register_callback`][Self::register_callback].
    pub fn register_key_callback<F>(&self, callback: F)
    where
        F: Fn(&KeyEvent) + Send + Sync + 'static,
    {
        *self.shared.key_cb.write().unwrap() = Some(Arc::new(callback));
    }

    /// Reverts key-event delivery to the key poll queue.
    pub fn clear_key_callback(&self) {
        *self.shared.key_cb.write().unwrap() = None;
    }

    /// Enables or disables the keymap layer.
    ///
    /// Fails with [`Error::Unsupported`] when the crate was built without
    /// the `xkb` feature.
    pub fn enable_keymap(&self, enabled: bool) -> Result<()> {
        #[cfg(feature = "xkb")]
        {
            let mut cfg = self.shared.keymap_cfg.lock().unwrap();
            if enabled {
                keymap::compile(&cfg.names)?;
            }
            cfg.enabled = enabled;
            cfg.epoch += 1;
            Ok(())
        }
        #[cfg(not(feature = "xkb"))]
        {
            let _ = enabled;
            Err(Error::Unsupported)
        }
    }

    /// Reconfigures the keymap RMLVO names. Takes effect immediately when
    /// the layer is enabled; bad names are rejected without touching the
    /// active keymap.
    pub fn set_keymap_names(&self, names: Names) -> Result<()> {
        #[cfg(feature = "xkb")]
        {
            names.validate()?;
            let mut cfg = self.shared.keymap_cfg.lock().unwrap();
            if cfg.enabled {
                keymap::compile(&names)?;
            }
            cfg.names = names;
            if cfg.enabled {
                cfg.epoch += 1;
            }
            Ok(())
        }
        #[cfg(not(feature = "xkb"))]
        {
            let _ = names;
            Err(Error::Unsupported)
        }
    }

    /// Starts or stops the aggregated legacy pointer reader (see the
    /// [`codes::MICE_DEVICE_ID`] pseudo-endpoint).
    ///
    /// A pointing device that is also open as an evdev endpoint reports
    /// under two device ids while the reader runs.
    pub fn enable_mice(&self, enabled: bool) -> Result<()> {
        self.shared.mice_enabled.store(enabled, Ordering::Release);
        if !enabled {
            return Ok(());
        }
        let mut guard = self.mice_worker.lock().unwrap();
        if guard.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }
        let handle = std::thread::Builder::new()
            .name("input-capture-mice".into())
            .spawn({
                let shared = Arc::clone(&self.shared);
                move || mice::run(shared)
            })
            .map_err(Error::resource)?;
        *guard = Some(handle);
        Ok(())
    }

    /// Stops the worker threads, detaches and closes every endpoint and
    /// ends the event streams. Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.mice_enabled.store(false, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.mice_worker.lock().unwrap().take() {
            let _ = handle.join();
        }
        let mut reg = self.shared.registry.lock().unwrap();
        for dev in reg.drain() {
            let _ = self.shared.poller.del(&dev.file);
        }
        drop(reg);
        self.shared.events.close();
        self.shared.keys.close();
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        self.shutdown();
    }
}
