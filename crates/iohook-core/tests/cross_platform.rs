//! Integration tests: one physical gesture, three native dialects.
//!
//! Each backend reports the same user action in its own codes, button
//! numbering, wheel sign and clock. After `normalize` the embedder must not be
//! able to tell which platform produced the event.

use iohook_core::{
    normalize, Event, EventType, KeyCode, MouseButton, NativeButton, NativeEvent, NativeKey,
    NativeKind, NativeWheel, Platform, WheelAxis, WheelDirection,
};

/// Native vocabulary of one platform.
struct Dialect {
    platform: Platform,
    /// Multiplier from milliseconds to the platform's clock.
    clock: u64,
    key_a: u32,
    left_button: u8,
    /// Wheel delta for one notch towards the user.
    notch_down: i32,
}

const DIALECTS: [Dialect; 3] = [
    Dialect {
        platform: Platform::Windows,
        clock: 1,
        key_a: 0x41,
        left_button: 1,
        notch_down: -120,
    },
    Dialect {
        platform: Platform::X11,
        clock: 1,
        key_a: 0x61,
        left_button: 1,
        notch_down: -1,
    },
    Dialect {
        platform: Platform::Quartz,
        clock: 1_000_000,
        key_a: 0x00,
        left_button: 0,
        notch_down: -1,
    },
];

/// Type "a", click the left button once, scroll one notch down.
fn gesture(d: &Dialect) -> Vec<NativeEvent> {
    let key = NativeKey {
        code: d.key_a,
        scan_code: 0,
        extended: false,
    };
    let button = NativeButton {
        button: d.left_button,
        clicks: 1,
        x: 300,
        y: 200,
    };
    let wheel = NativeWheel {
        axis: WheelAxis::Vertical,
        delta: d.notch_down,
        amount: 3,
        page: false,
        x: 300,
        y: 200,
    };
    let kinds = [
        NativeKind::KeyDown(key),
        NativeKind::KeyTyped(key, 'a'),
        NativeKind::KeyUp(key),
        NativeKind::ButtonDown(button),
        NativeKind::ButtonUp(button),
        NativeKind::ButtonClick(button),
        NativeKind::Wheel(wheel),
    ];
    kinds
        .into_iter()
        .enumerate()
        .map(|(i, kind)| NativeEvent::new(d.platform, (10 + i as u64) * d.clock, 0, kind))
        .collect()
}

fn portable(d: &Dialect) -> Vec<Event> {
    gesture(d).iter().map(normalize).collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn test_same_gesture_yields_the_same_event_types_on_every_platform() {
    let expected = vec![
        EventType::KeyPressed,
        EventType::KeyTyped,
        EventType::KeyReleased,
        EventType::MousePressed,
        EventType::MouseReleased,
        EventType::MouseClicked,
        EventType::MouseWheel,
    ];

    for dialect in &DIALECTS {
        let types: Vec<EventType> = portable(dialect).iter().map(Event::event_type).collect();
        assert_eq!(types, expected, "{:?}", dialect.platform);
    }
}

#[test]
fn test_key_button_and_wheel_agree_across_platforms() {
    for dialect in &DIALECTS {
        // Arrange / Act
        let events = portable(dialect);

        // Assert
        let keyboard = events[0].keyboard().expect("keyboard payload");
        assert_eq!(keyboard.key_code, KeyCode::KeyA, "{:?}", dialect.platform);
        assert_eq!(events[1].keyboard().and_then(|k| k.key_char), Some('a'));

        let click = events[5].mouse().expect("mouse payload");
        assert_eq!(click.button, MouseButton::Button1, "{:?}", dialect.platform);
        assert_eq!((click.clicks, click.x, click.y), (1, 300, 200));

        let wheel = events[6].wheel().expect("wheel payload");
        assert_eq!(wheel.direction, WheelDirection::Vertical);
        assert_eq!(wheel.rotation, 1, "{:?}", dialect.platform);
        assert_eq!(wheel.clicks, 1);
    }
}

#[test]
fn test_timestamps_come_out_in_milliseconds() {
    for dialect in &DIALECTS {
        let times: Vec<u64> = portable(dialect).iter().map(Event::time).collect();

        assert_eq!(times, (10..17).collect::<Vec<u64>>(), "{:?}", dialect.platform);
    }
}

#[test]
fn test_only_typed_events_carry_a_character() {
    for dialect in &DIALECTS {
        let with_char = portable(dialect)
            .iter()
            .filter(|e| e.keyboard().is_some_and(|k| k.key_char.is_some()))
            .count();

        assert_eq!(with_char, 1);
    }
}
