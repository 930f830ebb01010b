use super::{parse_events, Change};

fn record(mask: u32, name: &str) -> Vec<u8> {
    // wd, mask, cookie, len, then the nul-padded name.
    let mut padded = name.as_bytes().to_vec();
    padded.push(0);
    while padded.len() % 4 != 0 {
        padded.push(0);
    }
    let mut buf = Vec::new();
    buf.extend_from_slice(&1i32.to_ne_bytes());
    buf.extend_from_slice(&mask.to_ne_bytes());
    buf.extend_from_slice(&0u32.to_ne_bytes());
    buf.extend_from_slice(&(padded.len() as u32).to_ne_bytes());
    buf.extend_from_slice(&padded);
    buf
}

#[test]
fn test_create_and_delete() {
    let mut buf = record(libc::IN_CREATE, "event7");
    buf.extend(record(libc::IN_DELETE, "event3"));
    let mut out = Vec::new();
    parse_events(&buf, &mut out);
    assert_eq!(
        out,
        vec![Change::Added("event7".into()), Change::Removed(3)]
    );
}

#[test]
fn test_moved_to_counts_as_create() {
    let buf = record(libc::IN_MOVED_TO, "event12");
    let mut out = Vec::new();
    parse_events(&buf, &mut out);
    assert_eq!(out, vec![Change::Added("event12".into())]);
}

#[test]
fn test_non_event_nodes_are_skipped() {
    let mut buf = record(libc::IN_CREATE, "mouse0");
    buf.extend(record(libc::IN_CREATE, "js0"));
    buf.extend(record(libc::IN_DELETE, "mice"));
    buf.extend(record(libc::IN_CREATE, "event1"));
    let mut out = Vec::new();
    parse_events(&buf, &mut out);
    assert_eq!(out, vec![Change::Added("event1".into())]);
}

#[test]
fn test_truncated_buffer_stops_cleanly() {
    let buf = record(libc::IN_CREATE, "event5");
    let mut out = Vec::new();
    parse_events(&buf[..buf.len() - 2], &mut out);
    assert!(out.is_empty());
}
