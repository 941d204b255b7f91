//! Canonical key codes: USB HID Usage IDs (page 0x07, Keyboard/Keypad).
//!
//! Every backend reports keys in its own vocabulary (Windows virtual keys,
//! X11 keysyms, macOS virtual keycodes).  The normalizer folds all of them
//! into this one enum so that an embedder sees the same [`KeyCode::KeyA`] no
//! matter which operating system produced the event.
//!
//! HID codes identify *positions*, not characters.  The character a key
//! produced travels separately, in the `KeyTyped` event.
//!
//! [`KeyCode::Unknown`] (0x0000) is the sentinel for anything the tables do
//! not cover, for example vendor media keys.  Normalization never fails on an
//! unmapped key; it reports `Unknown` and keeps the raw platform code.

use serde::{Deserialize, Serialize};

/// Normalized virtual key code.
///
/// The discriminant is the HID usage ID, see [`KeyCode::as_u16`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum KeyCode {
    KeyA = 0x04,
    KeyB = 0x05,
    KeyC = 0x06,
    KeyD = 0x07,
    KeyE = 0x08,
    KeyF = 0x09,
    KeyG = 0x0A,
    KeyH = 0x0B,
    KeyI = 0x0C,
    KeyJ = 0x0D,
    KeyK = 0x0E,
    KeyL = 0x0F,
    KeyM = 0x10,
    KeyN = 0x11,
    KeyO = 0x12,
    KeyP = 0x13,
    KeyQ = 0x14,
    KeyR = 0x15,
    KeyS = 0x16,
    KeyT = 0x17,
    KeyU = 0x18,
    KeyV = 0x19,
    KeyW = 0x1A,
    KeyX = 0x1B,
    KeyY = 0x1C,
    KeyZ = 0x1D,

    Digit1 = 0x1E,
    Digit2 = 0x1F,
    Digit3 = 0x20,
    Digit4 = 0x21,
    Digit5 = 0x22,
    Digit6 = 0x23,
    Digit7 = 0x24,
    Digit8 = 0x25,
    Digit9 = 0x26,
    Digit0 = 0x27,

    Enter = 0x28,
    Escape = 0x29,
    Backspace = 0x2A,
    Tab = 0x2B,
    Space = 0x2C,
    Minus = 0x2D,
    Equal = 0x2E,
    BracketLeft = 0x2F,
    BracketRight = 0x30,
    Backslash = 0x31,
    Semicolon = 0x33,
    Quote = 0x34,
    Backquote = 0x35,
    Comma = 0x36,
    Period = 0x37,
    Slash = 0x38,
    CapsLock = 0x39,

    F1 = 0x3A,
    F2 = 0x3B,
    F3 = 0x3C,
    F4 = 0x3D,
    F5 = 0x3E,
    F6 = 0x3F,
    F7 = 0x40,
    F8 = 0x41,
    F9 = 0x42,
    F10 = 0x43,
    F11 = 0x44,
    F12 = 0x45,

    PrintScreen = 0x46,
    ScrollLock = 0x47,
    Pause = 0x48,
    Insert = 0x49,
    Home = 0x4A,
    PageUp = 0x4B,
    Delete = 0x4C,
    End = 0x4D,
    PageDown = 0x4E,
    ArrowRight = 0x4F,
    ArrowLeft = 0x50,
    ArrowDown = 0x51,
    ArrowUp = 0x52,

    NumLock = 0x53,
    NumpadDivide = 0x54,
    NumpadMultiply = 0x55,
    NumpadSubtract = 0x56,
    NumpadAdd = 0x57,
    NumpadEnter = 0x58,
    Numpad1 = 0x59,
    Numpad2 = 0x5A,
    Numpad3 = 0x5B,
    Numpad4 = 0x5C,
    Numpad5 = 0x5D,
    Numpad6 = 0x5E,
    Numpad7 = 0x5F,
    Numpad8 = 0x60,
    Numpad9 = 0x61,
    Numpad0 = 0x62,
    NumpadDecimal = 0x63,

    /// ISO key between left Shift and Z.
    IntlBackslash = 0x64,
    ContextMenu = 0x65,

    F13 = 0x68,
    F14 = 0x69,
    F15 = 0x6A,
    F16 = 0x6B,
    F17 = 0x6C,
    F18 = 0x6D,
    F19 = 0x6E,
    F20 = 0x6F,
    F21 = 0x70,
    F22 = 0x71,
    F23 = 0x72,
    F24 = 0x73,

    ControlLeft = 0xE0,
    ShiftLeft = 0xE1,
    AltLeft = 0xE2,
    MetaLeft = 0xE3,
    ControlRight = 0xE4,
    ShiftRight = 0xE5,
    AltRight = 0xE6,
    MetaRight = 0xE7,

    /// Sentinel for keys with no canonical mapping.
    Unknown = 0x0000,
}

/// Usage ID → variant lookup, built once at compile time.
const FROM_USAGE: [KeyCode; 256] = {
    use KeyCode::*;
    let known = [
        KeyA, KeyB, KeyC, KeyD, KeyE, KeyF, KeyG, KeyH, KeyI, KeyJ, KeyK, KeyL, KeyM, KeyN,
        KeyO, KeyP, KeyQ, KeyR, KeyS, KeyT, KeyU, KeyV, KeyW, KeyX, KeyY, KeyZ, Digit1, Digit2,
        Digit3, Digit4, Digit5, Digit6, Digit7, Digit8, Digit9, Digit0, Enter, Escape,
        Backspace, Tab, Space, Minus, Equal, BracketLeft, BracketRight, Backslash, Semicolon,
        Quote, Backquote, Comma, Period, Slash, CapsLock, F1, F2, F3, F4, F5, F6, F7, F8, F9,
        F10, F11, F12, PrintScreen, ScrollLock, Pause, Insert, Home, PageUp, Delete, End,
        PageDown, ArrowRight, ArrowLeft, ArrowDown, ArrowUp, NumLock, NumpadDivide,
        NumpadMultiply, NumpadSubtract, NumpadAdd, NumpadEnter, Numpad1, Numpad2, Numpad3,
        Numpad4, Numpad5, Numpad6, Numpad7, Numpad8, Numpad9, Numpad0, NumpadDecimal,
        IntlBackslash, ContextMenu, F13, F14, F15, F16, F17, F18, F19, F20, F21, F22, F23,
        F24, ControlLeft, ShiftLeft, AltLeft, MetaLeft, ControlRight, ShiftRight, AltRight,
        MetaRight,
    ];
    let mut t = [Unknown; 256];
    let mut i = 0;
    while i < known.len() {
        t[known[i] as usize] = known[i];
        i += 1;
    }
    t
};

impl KeyCode {
    /// Looks up the variant for a raw HID usage ID.
    ///
    /// Values outside the keyboard page, or unassigned ones, give
    /// [`KeyCode::Unknown`].
    pub fn from_u16(value: u16) -> Self {
        FROM_USAGE
            .get(value as usize)
            .copied()
            .unwrap_or(KeyCode::Unknown)
    }

    /// Returns the HID usage ID.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn is_unknown(self) -> bool {
        self == KeyCode::Unknown
    }

    /// Returns `true` for the eight Shift/Ctrl/Alt/Meta keys.
    pub fn is_modifier(self) -> bool {
        (0xE0..=0xE7).contains(&self.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u16_resolves_every_declared_variant() {
        // Arrange
        let samples = [
            (0x04, KeyCode::KeyA),
            (0x1D, KeyCode::KeyZ),
            (0x27, KeyCode::Digit0),
            (0x28, KeyCode::Enter),
            (0x45, KeyCode::F12),
            (0x58, KeyCode::NumpadEnter),
            (0x64, KeyCode::IntlBackslash),
            (0x73, KeyCode::F24),
            (0xE7, KeyCode::MetaRight),
        ];

        for (raw, expected) in samples {
            // Act
            let code = KeyCode::from_u16(raw);

            // Assert
            assert_eq!(code, expected, "from_u16(0x{raw:04X})");
            assert_eq!(code.as_u16(), raw);
        }
    }

    #[test]
    fn test_unassigned_and_out_of_page_values_are_unknown() {
        for raw in [0x00, 0x01, 0x03, 0x32, 0x66, 0xA0, 0xFF, 0x0100, 0xFFFF] {
            assert_eq!(KeyCode::from_u16(raw), KeyCode::Unknown, "0x{raw:04X}");
        }
    }

    #[test]
    fn test_is_modifier_covers_exactly_the_modifier_block() {
        assert!(KeyCode::ShiftLeft.is_modifier());
        assert!(KeyCode::MetaRight.is_modifier());
        assert!(!KeyCode::CapsLock.is_modifier());
        assert!(!KeyCode::Unknown.is_modifier());
    }
}
