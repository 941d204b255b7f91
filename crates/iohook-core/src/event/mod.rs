//! The portable event model.
//!
//! An [`Event`] is what the embedder receives: one keyboard, mouse, wheel or
//! hook-status occurrence, already normalized.  Its payload is a tagged union
//! selected by [`EventType`], and [`Event::new`] refuses any combination where
//! the two disagree, so a constructed event always carries the right variant.
//!
//! Events are immutable once built.  Fields are private; use the accessors.

pub mod mask;

pub use mask::ModifierMask;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keymap::KeyCode;

// ── Event type ───────────────────────────────────────────────────────────────

/// Kind of occurrence.
///
/// The numeric codes are stable and match the values historically exposed to
/// embedders; [`EventType::name`] gives the matching short name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum EventType {
    HookEnabled = 1,
    HookDisabled = 2,
    KeyTyped = 3,
    KeyPressed = 4,
    KeyReleased = 5,
    MouseClicked = 6,
    MousePressed = 7,
    MouseReleased = 8,
    MouseMoved = 9,
    MouseDragged = 10,
    MouseWheel = 11,
}

impl EventType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        use EventType::*;
        Some(match code {
            1 => HookEnabled,
            2 => HookDisabled,
            3 => KeyTyped,
            4 => KeyPressed,
            5 => KeyReleased,
            6 => MouseClicked,
            7 => MousePressed,
            8 => MouseReleased,
            9 => MouseMoved,
            10 => MouseDragged,
            11 => MouseWheel,
            _ => return None,
        })
    }

    /// Short listener name, e.g. `"keydown"` for [`EventType::KeyPressed`].
    pub fn name(self) -> &'static str {
        match self {
            EventType::HookEnabled => "hookenabled",
            EventType::HookDisabled => "hookdisabled",
            EventType::KeyTyped => "keypress",
            EventType::KeyPressed => "keydown",
            EventType::KeyReleased => "keyup",
            EventType::MouseClicked => "mouseclick",
            EventType::MousePressed => "mousedown",
            EventType::MouseReleased => "mouseup",
            EventType::MouseMoved => "mousemove",
            EventType::MouseDragged => "mousedrag",
            EventType::MouseWheel => "mousewheel",
        }
    }

    /// Payload variant this type requires.
    pub fn payload_kind(self) -> PayloadKind {
        match self {
            EventType::HookEnabled | EventType::HookDisabled => PayloadKind::Hook,
            EventType::KeyTyped | EventType::KeyPressed | EventType::KeyReleased => {
                PayloadKind::Keyboard
            }
            EventType::MouseWheel => PayloadKind::Wheel,
            EventType::MouseClicked
            | EventType::MousePressed
            | EventType::MouseReleased
            | EventType::MouseMoved
            | EventType::MouseDragged => PayloadKind::Mouse,
        }
    }
}

// ── Payload pieces ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MouseButton {
    /// Sentinel: motion events, or an ordinal the platform table does not know.
    #[default]
    NoButton = 0,
    /// Left.
    Button1 = 1,
    /// Right.
    Button2 = 2,
    /// Middle.
    Button3 = 3,
    /// Back.
    Button4 = 4,
    /// Forward.
    Button5 = 5,
}

impl MouseButton {
    /// Mask bit that is set while this button is held.
    pub fn mask_bit(self) -> u16 {
        match self {
            MouseButton::NoButton => 0,
            MouseButton::Button1 => ModifierMask::BUTTON1,
            MouseButton::Button2 => ModifierMask::BUTTON2,
            MouseButton::Button3 => ModifierMask::BUTTON3,
            MouseButton::Button4 => ModifierMask::BUTTON4,
            MouseButton::Button5 => ModifierMask::BUTTON5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum WheelDirection {
    Vertical = 3,
    Horizontal = 4,
}

/// How the OS wants a wheel notch applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ScrollType {
    /// Scroll by `amount` lines per notch.
    Unit = 1,
    /// Scroll by one page per notch.
    Block = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyboardData {
    pub key_code: KeyCode,
    /// Platform code before normalization (VK, X11 keycode, CGKeyCode).
    pub raw_code: u32,
    /// Only present on [`EventType::KeyTyped`].
    pub key_char: Option<char>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MouseData {
    pub button: MouseButton,
    pub clicks: u16,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WheelData {
    /// Lines per notch for [`ScrollType::Unit`].
    pub amount: u16,
    pub clicks: u16,
    pub direction: WheelDirection,
    /// Signed notch count: negative is up/left, positive is down/right.
    pub rotation: i32,
    pub scroll_type: ScrollType,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPayload {
    Hook,
    Keyboard(KeyboardData),
    Mouse(MouseData),
    Wheel(WheelData),
}

impl EventPayload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            EventPayload::Hook => PayloadKind::Hook,
            EventPayload::Keyboard(_) => PayloadKind::Keyboard,
            EventPayload::Mouse(_) => PayloadKind::Mouse,
            EventPayload::Wheel(_) => PayloadKind::Wheel,
        }
    }
}

/// Discriminant of [`EventPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Hook,
    Keyboard,
    Mouse,
    Wheel,
}

// ── Event ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("{event_type:?} requires a {expected:?} payload, got {actual:?}")]
    PayloadMismatch {
        event_type: EventType,
        expected: PayloadKind,
        actual: PayloadKind,
    },

    #[error("key_char is only valid on KeyTyped, not {0:?}")]
    UnexpectedKeyChar(EventType),
}

/// One normalized input occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    event_type: EventType,
    mask: ModifierMask,
    /// Milliseconds, monotonic within one backend.
    time: u64,
    payload: EventPayload,
}

impl Event {
    /// Builds an event, checking that `payload` is the variant `event_type`
    /// selects.
    pub fn new(
        event_type: EventType,
        mask: ModifierMask,
        time: u64,
        payload: EventPayload,
    ) -> Result<Self, EventError> {
        let expected = event_type.payload_kind();
        let actual = payload.kind();
        if expected != actual {
            return Err(EventError::PayloadMismatch {
                event_type,
                expected,
                actual,
            });
        }
        if let EventPayload::Keyboard(data) = &payload {
            if data.key_char.is_some() && event_type != EventType::KeyTyped {
                return Err(EventError::UnexpectedKeyChar(event_type));
            }
        }
        Ok(Self::assemble(event_type, mask, time, payload))
    }

    /// Used by the normalizer, whose match arms pair types and payloads
    /// correctly by construction.
    pub(crate) fn assemble(
        event_type: EventType,
        mask: ModifierMask,
        time: u64,
        payload: EventPayload,
    ) -> Self {
        debug_assert_eq!(event_type.payload_kind(), payload.kind());
        Event {
            event_type,
            mask,
            time,
            payload,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn mask(&self) -> ModifierMask {
        self.mask
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn keyboard(&self) -> Option<&KeyboardData> {
        match &self.payload {
            EventPayload::Keyboard(data) => Some(data),
            _ => None,
        }
    }

    pub fn mouse(&self) -> Option<&MouseData> {
        match &self.payload {
            EventPayload::Mouse(data) => Some(data),
            _ => None,
        }
    }

    pub fn wheel(&self) -> Option<&WheelData> {
        match &self.payload {
            EventPayload::Wheel(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_hook_status(&self) -> bool {
        self.event_type.payload_kind() == PayloadKind::Hook
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click_payload() -> EventPayload {
        EventPayload::Mouse(MouseData {
            button: MouseButton::Button1,
            clicks: 2,
            x: 10,
            y: 20,
        })
    }

    #[test]
    fn test_new_accepts_matching_type_and_payload() {
        // Arrange / Act
        let event = Event::new(
            EventType::MouseClicked,
            ModifierMask::empty(),
            42,
            click_payload(),
        )
        .expect("matching payload must be accepted");

        // Assert
        assert_eq!(event.event_type(), EventType::MouseClicked);
        assert_eq!(event.time(), 42);
        assert_eq!(event.mouse().map(|m| m.clicks), Some(2));
        assert!(event.keyboard().is_none());
    }

    #[test]
    fn test_new_rejects_payload_of_the_wrong_variant() {
        // Act
        let result = Event::new(
            EventType::KeyPressed,
            ModifierMask::empty(),
            0,
            click_payload(),
        );

        // Assert
        assert_eq!(
            result,
            Err(EventError::PayloadMismatch {
                event_type: EventType::KeyPressed,
                expected: PayloadKind::Keyboard,
                actual: PayloadKind::Mouse,
            })
        );
    }

    #[test]
    fn test_new_rejects_key_char_outside_key_typed() {
        let payload = EventPayload::Keyboard(KeyboardData {
            key_code: KeyCode::KeyA,
            raw_code: 0x41,
            key_char: Some('a'),
        });

        let result = Event::new(EventType::KeyPressed, ModifierMask::empty(), 0, payload);

        assert_eq!(result, Err(EventError::UnexpectedKeyChar(EventType::KeyPressed)));
    }

    #[test]
    fn test_every_code_round_trips_and_has_a_name() {
        for code in 1..=11u8 {
            let event_type = EventType::from_code(code).expect("codes 1..=11 are assigned");
            assert_eq!(event_type.code(), code);
            assert!(!event_type.name().is_empty());
        }
        assert_eq!(EventType::from_code(0), None);
        assert_eq!(EventType::from_code(12), None);
    }

    #[test]
    fn test_serialized_shape_uses_type_key_and_snake_case_names() {
        // Arrange
        let event = Event::new(
            EventType::MouseClicked,
            ModifierMask(ModifierMask::SHIFT_L),
            7,
            click_payload(),
        )
        .unwrap();

        // Act
        let json = serde_json::to_value(event).unwrap();

        // Assert
        assert_eq!(json["type"], "mouse_clicked");
        assert_eq!(json["mask"], 1);
        assert_eq!(json["payload"]["mouse"]["button"], "button1");
        assert_eq!(json["payload"]["mouse"]["x"], 10);
    }
}
