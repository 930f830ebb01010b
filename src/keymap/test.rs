use super::compile;
use crate::config::Names;
use crate::event::{codes, Event, Mods};

fn key(code: u16, value: i32) -> Event {
    Event {
        device_id: 1,
        ty: codes::EV_KEY,
        code,
        value,
        ..Default::default()
    }
}

#[test]
fn test_shifted_letter_text_and_mods() {
    let mut map = compile(&Names::default()).unwrap();

    let shift_down = map.process(&key(codes::KEY_LEFTSHIFT, 1));
    assert!(shift_down.down);
    assert!(shift_down.mods.contains(Mods::SHIFT));

    let a_down = map.process(&key(codes::KEY_A, 1));
    assert!(a_down.down);
    assert!(a_down.mods.contains(Mods::SHIFT));
    assert_eq!(a_down.text.as_str(), "A");

    let a_up = map.process(&key(codes::KEY_A, 0));
    assert!(!a_up.down);
    assert!(a_up.text.is_empty());

    let shift_up = map.process(&key(codes::KEY_LEFTSHIFT, 0));
    assert!(!shift_up.mods.contains(Mods::SHIFT));

    let a_again = map.process(&key(codes::KEY_A, 1));
    assert_eq!(a_again.text.as_str(), "a");
    assert!(a_again.mods.is_empty());
    map.process(&key(codes::KEY_A, 0));
}

#[test]
fn test_escape_produces_no_text() {
    let mut map = compile(&Names::default()).unwrap();
    let esc = map.process(&key(codes::KEY_ESC, 1));
    assert!(esc.down);
    assert!(esc.text.is_empty());
}

#[test]
fn test_bad_layout_is_rejected() {
    let names = Names {
        layout: "definitely-not-a-layout".into(),
        ..Default::default()
    };
    assert!(compile(&names).is_err());
}
