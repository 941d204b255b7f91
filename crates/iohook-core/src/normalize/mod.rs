//! Native event → portable [`Event`].
//!
//! [`normalize`] is a pure, total function.  It keeps no state between
//! calls, performs no I/O and has no failure path: anything the tables do not
//! know becomes [`KeyCode::Unknown`] or [`MouseButton::NoButton`], and the raw
//! platform code is kept alongside.
//!
//! Stateful derivations (click counting, the Windows modifier word) happen in
//! the backends before this point; see [`crate::click::ClickTracker`].

pub mod modifiers;

use crate::event::{
    Event, EventPayload, EventType, KeyboardData, MouseButton, MouseData, ScrollType, WheelData,
    WheelDirection,
};
use crate::keymap::{KeyCode, KeyMapper};
use crate::native::{
    NativeButton, NativeEvent, NativeKey, NativeKind, NativeWheel, Platform, WheelAxis,
};

/// Windows reports wheel motion in multiples of this value per notch.
pub const WHEEL_DELTA: i32 = 120;

const NANOS_PER_MILLI: u64 = 1_000_000;

/// Maps one native occurrence to exactly one [`Event`].
pub fn normalize(native: &NativeEvent) -> Event {
    let platform = native.platform;
    let mask = modifiers::mask(platform, native.modifiers);
    let time = millis(platform, native.time);

    let (event_type, payload) = match native.kind {
        NativeKind::HookEnabled => (EventType::HookEnabled, EventPayload::Hook),
        NativeKind::HookDisabled => (EventType::HookDisabled, EventPayload::Hook),
        NativeKind::KeyDown(key) => (EventType::KeyPressed, keyboard(platform, key, None)),
        NativeKind::KeyUp(key) => (EventType::KeyReleased, keyboard(platform, key, None)),
        NativeKind::KeyTyped(key, ch) => (EventType::KeyTyped, keyboard(platform, key, Some(ch))),
        NativeKind::ButtonDown(b) => (EventType::MousePressed, mouse(platform, b)),
        NativeKind::ButtonUp(b) => (EventType::MouseReleased, mouse(platform, b)),
        NativeKind::ButtonClick(b) => (EventType::MouseClicked, mouse(platform, b)),
        NativeKind::Motion { x, y } => {
            let event_type = if mask.any_button() {
                EventType::MouseDragged
            } else {
                EventType::MouseMoved
            };
            let data = MouseData {
                button: MouseButton::NoButton,
                clicks: 0,
                x,
                y,
            };
            (event_type, EventPayload::Mouse(data))
        }
        NativeKind::Wheel(w) => (EventType::MouseWheel, wheel(platform, w)),
    };

    Event::assemble(event_type, mask, time, payload)
}

fn millis(platform: Platform, time: u64) -> u64 {
    match platform {
        Platform::Quartz => time / NANOS_PER_MILLI,
        Platform::Windows | Platform::X11 => time,
    }
}

fn key_code(platform: Platform, key: NativeKey) -> KeyCode {
    match platform {
        Platform::Windows => KeyMapper::from_windows_vk(key.code, key.scan_code, key.extended),
        Platform::X11 => KeyMapper::from_x11_keysym(key.code),
        Platform::Quartz => match u16::try_from(key.code) {
            Ok(code) => KeyMapper::from_macos_keycode(code),
            Err(_) => KeyCode::Unknown,
        },
    }
}

fn keyboard(platform: Platform, key: NativeKey, key_char: Option<char>) -> EventPayload {
    // Quartz has a single code space, so the keycode itself is the raw code.
    let raw_code = match platform {
        Platform::Quartz => key.code,
        Platform::Windows | Platform::X11 => key.scan_code,
    };
    EventPayload::Keyboard(KeyboardData {
        key_code: key_code(platform, key),
        raw_code,
        key_char,
    })
}

fn mouse(platform: Platform, b: NativeButton) -> EventPayload {
    EventPayload::Mouse(MouseData {
        button: modifiers::button(platform, b.button),
        clicks: b.clicks,
        x: b.x,
        y: b.y,
    })
}

/// Notch count with the sign of the platform delta.
///
/// Partial Windows deltas from high-resolution wheels count as one notch.
fn notches(platform: Platform, delta: i32) -> i32 {
    match platform {
        Platform::Windows => {
            let whole = (delta.unsigned_abs() + WHEEL_DELTA.unsigned_abs() - 1)
                / WHEEL_DELTA.unsigned_abs();
            delta.signum() * whole as i32
        }
        Platform::X11 | Platform::Quartz => delta,
    }
}

fn wheel(platform: Platform, w: NativeWheel) -> EventPayload {
    let n = notches(platform, w.delta);
    // Canonical rotation is negative up/left. Only Windows and X11 horizontal
    // deltas already point right.
    let rotation = match (platform, w.axis) {
        (Platform::Windows | Platform::X11, WheelAxis::Horizontal) => n,
        _ => n.saturating_neg(),
    };
    let direction = match w.axis {
        WheelAxis::Vertical => WheelDirection::Vertical,
        WheelAxis::Horizontal => WheelDirection::Horizontal,
    };
    let scroll_type = if w.page {
        ScrollType::Block
    } else {
        ScrollType::Unit
    };
    EventPayload::Wheel(WheelData {
        amount: w.amount,
        clicks: u16::try_from(rotation.unsigned_abs()).unwrap_or(u16::MAX),
        direction,
        rotation,
        scroll_type,
        x: w.x,
        y: w.y,
    })
}
