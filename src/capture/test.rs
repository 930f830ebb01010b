use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use super::Capture;
use crate::config::Opts;
use crate::error::Error;
use crate::event::{codes, Event};
use crate::ffi::{bindings as b, RAW_EVENT_SIZE};

// FIFOs stand in for device nodes: they open with the same flags, feed the
// same epoll/read path, and a test can push hand-built kernel records
// through them without any device access.

fn mkfifo(path: &Path) {
    let cpath = CString::new(path.as_os_str().as_bytes()).unwrap();
    assert_eq!(unsafe { libc::mkfifo(cpath.as_ptr(), 0o600) }, 0);
}

/// Keeps the FIFO write-open so the reader side never sees EOF.
fn fifo_with_writer(path: &Path) -> File {
    mkfifo(path);
    OpenOptions::new().read(true).write(true).open(path).unwrap()
}

fn opts(dir: &TempDir) -> Opts {
    Opts {
        dir: dir.path().to_path_buf(),
        ..Default::default()
    }
}

fn record_at(ty: u16, code: u16, value: i32, sec: i64, usec: i64) -> Vec<u8> {
    let rec = b::input_event {
        time: libc::timeval {
            tv_sec: sec as _,
            tv_usec: usec as _,
        },
        type_: ty,
        code,
        value,
    };
    let ptr = &rec as *const b::input_event as *const u8;
    unsafe { std::slice::from_raw_parts(ptr, RAW_EVENT_SIZE) }.to_vec()
}

fn wait_for(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}

#[test]
fn test_scan_order_and_timestamps() {
    let dir = TempDir::new().unwrap();
    let writer = fifo_with_writer(&dir.path().join("event3"));
    let capture = Capture::new(opts(&dir)).unwrap();
    assert_eq!(capture.device_count(), 1);

    let mut payload = record_at(codes::EV_KEY, codes::KEY_A, 1, 1, 500);
    payload.extend(record_at(codes::EV_SYN, codes::SYN_REPORT, 0, 1, 600));
    payload.extend(record_at(codes::EV_KEY, codes::KEY_A, 0, 1, 700));
    (&writer).write_all(&payload).unwrap();

    let mut buf = [Event::default(); 16];
    let mut got = Vec::new();
    assert!(wait_for(
        || {
            let n = capture.poll(&mut buf).unwrap();
            got.extend_from_slice(&buf[..n]);
            got.len() >= 3
        },
        Duration::from_secs(2)
    ));

    assert_eq!(got.len(), 3);
    // Delivered in kernel order, tagged with the node index.
    assert_eq!(got[0].device_id, 3);
    assert_eq!(
        (got[0].ty, got[0].code, got[0].value),
        (codes::EV_KEY, codes::KEY_A, 1)
    );
    assert_eq!((got[1].ty, got[1].code), (codes::EV_SYN, codes::SYN_REPORT));
    assert_eq!(
        (got[2].ty, got[2].code, got[2].value),
        (codes::EV_KEY, codes::KEY_A, 0)
    );
    // Kernel timestamps are carried verbatim and stay monotone per device.
    assert_eq!(got[0].time_ns, 1_000_500_000);
    assert_eq!(got[2].time_ns, 1_000_700_000);
    assert!(got[1].time_ns <= got[2].time_ns);
}

#[test]
fn test_callback_bypasses_queue() {
    let dir = TempDir::new().unwrap();
    let writer = fifo_with_writer(&dir.path().join("event1"));
    let capture = Capture::new(opts(&dir)).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    capture.register_callback({
        let seen = Arc::clone(&seen);
        move |ev: &Event| seen.lock().unwrap().push(*ev)
    });

    (&writer)
        .write_all(&record_at(codes::EV_KEY, codes::KEY_B, 1, 0, 0))
        .unwrap();
    assert!(wait_for(
        || !seen.lock().unwrap().is_empty(),
        Duration::from_secs(2)
    ));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].code, codes::KEY_B);
    // The record went without one: stamped at ingest instead.
    assert!(seen[0].time_ns > 0);

    // The callback consumed it; the queue saw no copy.
    let mut buf = [Event::default(); 4];
    assert_eq!(capture.poll(&mut buf).unwrap(), 0);
}

#[test]
fn test_hotplug_add_and_remove() {
    let dir = TempDir::new().unwrap();
    let capture = Capture::new(opts(&dir)).unwrap();
    assert_eq!(capture.device_count(), 0);

    mkfifo(&dir.path().join("event5"));
    assert!(wait_for(
        || capture.device_count() == 1,
        Duration::from_secs(3)
    ));

    std::fs::remove_file(dir.path().join("event5")).unwrap();
    assert!(wait_for(
        || capture.device_count() == 0,
        Duration::from_secs(3)
    ));
}

#[test]
fn test_hotplug_rename_into_place() {
    let dir = TempDir::new().unwrap();
    let capture = Capture::new(opts(&dir)).unwrap();

    // Device managers create under a temporary name, then rename.
    mkfifo(&dir.path().join("pending"));
    std::fs::rename(dir.path().join("pending"), dir.path().join("event6")).unwrap();
    assert!(wait_for(
        || capture.device_count() == 1,
        Duration::from_secs(3)
    ));
}

#[test]
fn test_filter_reconfiguration() {
    let dir = TempDir::new().unwrap();
    mkfifo(&dir.path().join("event1"));
    mkfifo(&dir.path().join("event2"));
    let capture = Capture::new(opts(&dir)).unwrap();
    assert_eq!(capture.device_count(), 2);

    capture.set_filter(|info| info.id != 2);
    assert_eq!(capture.device_count(), 1);

    capture.clear_filter();
    assert_eq!(capture.device_count(), 2);
}

#[test]
fn test_event_stream() {
    let dir = TempDir::new().unwrap();
    let writer = fifo_with_writer(&dir.path().join("event2"));
    let mut capture = Capture::new(opts(&dir)).unwrap();

    (&writer)
        .write_all(&record_at(codes::EV_REL, codes::REL_X, -4, 0, 0))
        .unwrap();

    tokio_test::block_on(async {
        let mut stream = capture.events();
        let ev = stream.next().await.unwrap();
        assert_eq!(ev.device_id, 2);
        assert_eq!((ev.ty, ev.code, ev.value), (codes::EV_REL, codes::REL_X, -4));
    });

    capture.shutdown();
    tokio_test::block_on(async {
        assert!(capture.events().next().await.is_none());
    });
}

#[test]
fn test_legacy_pointer_stream() {
    let dir = TempDir::new().unwrap();
    let writer = fifo_with_writer(&dir.path().join("mice"));
    let capture = Capture::new(opts(&dir)).unwrap();
    capture.enable_mice(true).unwrap();

    // Left button down, dx = +5, dy = +3.
    (&writer).write_all(&[0x09, 5, 3]).unwrap();

    let mut buf = [Event::default(); 16];
    let mut got = Vec::new();
    assert!(wait_for(
        || {
            let n = capture.poll(&mut buf).unwrap();
            got.extend_from_slice(&buf[..n]);
            got.iter().any(|e| e.ty == codes::EV_REL && e.code == codes::REL_Y)
        },
        Duration::from_secs(2)
    ));

    assert!(got.iter().all(|e| e.device_id == codes::MICE_DEVICE_ID));
    let btn = got
        .iter()
        .find(|e| e.ty == codes::EV_KEY)
        .expect("button event");
    assert_eq!((btn.code, btn.value), (codes::BTN_LEFT, 1));
    let rel_y = got
        .iter()
        .find(|e| e.ty == codes::EV_REL && e.code == codes::REL_Y)
        .unwrap();
    assert_eq!(rel_y.value, -3);
}

#[test]
fn test_poll_rejects_empty_buffer() {
    let dir = TempDir::new().unwrap();
    let capture = Capture::new(opts(&dir)).unwrap();
    assert!(matches!(
        capture.poll(&mut []),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_invalid_ring_exp() {
    for ring_exp in [0, 17] {
        let result = Capture::new(Opts {
            ring_exp,
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}

#[cfg(not(feature = "xkb"))]
#[test]
fn test_keymap_unsupported_without_feature() {
    let dir = TempDir::new().unwrap();
    let capture = Capture::new(opts(&dir)).unwrap();
    assert!(matches!(
        capture.enable_keymap(true),
        Err(Error::Unsupported)
    ));
    assert!(matches!(
        capture.set_keymap_names(crate::config::Names::default()),
        Err(Error::Unsupported)
    ));
}

#[cfg(feature = "xkb")]
#[test]
fn test_key_events_flow_when_keymap_enabled() {
    use crate::event::KeyEvent;

    let dir = TempDir::new().unwrap();
    let writer = fifo_with_writer(&dir.path().join("event4"));
    let capture = Capture::new(opts(&dir)).unwrap();
    capture.enable_keymap(true).unwrap();

    (&writer)
        .write_all(&record_at(codes::EV_KEY, codes::KEY_A, 1, 0, 0))
        .unwrap();

    let mut buf = [KeyEvent::default(); 8];
    let mut got = Vec::new();
    assert!(wait_for(
        || {
            let n = capture.poll_keys(&mut buf).unwrap();
            got.extend_from_slice(&buf[..n]);
            !got.is_empty()
        },
        Duration::from_secs(2)
    ));

    assert!(got[0].down);
    assert_eq!(got[0].device_id, 4);
    assert_eq!(got[0].text.as_str(), "a");
}
