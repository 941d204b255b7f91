//! macOS virtual keycodes (`kVK_*` from `HIToolbox/Events.h`) → [`KeyCode`].
//!
//! Quartz event taps report these through the
//! `kCGKeyboardEventKeycode` field.  They are position codes on an ANSI
//! layout, so the mapping is layout independent, just like HID.

use super::key_code::KeyCode;

/// Translates a `CGKeyCode` to the canonical key code.
pub fn cg_keycode_to_key_code(code: u16) -> KeyCode {
    use KeyCode::*;

    match code {
        0x00 => KeyA,
        0x01 => KeyS,
        0x02 => KeyD,
        0x03 => KeyF,
        0x04 => KeyH,
        0x05 => KeyG,
        0x06 => KeyZ,
        0x07 => KeyX,
        0x08 => KeyC,
        0x09 => KeyV,
        0x0A => IntlBackslash, // kVK_ISO_Section
        0x0B => KeyB,
        0x0C => KeyQ,
        0x0D => KeyW,
        0x0E => KeyE,
        0x0F => KeyR,
        0x10 => KeyY,
        0x11 => KeyT,
        0x12 => Digit1,
        0x13 => Digit2,
        0x14 => Digit3,
        0x15 => Digit4,
        0x16 => Digit6,
        0x17 => Digit5,
        0x18 => Equal,
        0x19 => Digit9,
        0x1A => Digit7,
        0x1B => Minus,
        0x1C => Digit8,
        0x1D => Digit0,
        0x1E => BracketRight,
        0x1F => KeyO,
        0x20 => KeyU,
        0x21 => BracketLeft,
        0x22 => KeyI,
        0x23 => KeyP,
        0x24 => Enter,
        0x25 => KeyL,
        0x26 => KeyJ,
        0x27 => Quote,
        0x28 => KeyK,
        0x29 => Semicolon,
        0x2A => Backslash,
        0x2B => Comma,
        0x2C => Slash,
        0x2D => KeyN,
        0x2E => KeyM,
        0x2F => Period,
        0x30 => Tab,
        0x31 => Space,
        0x32 => Backquote,
        0x33 => Backspace, // kVK_Delete
        0x35 => Escape,
        0x36 => MetaRight,
        0x37 => MetaLeft,
        0x38 => ShiftLeft,
        0x39 => CapsLock,
        0x3A => AltLeft,
        0x3B => ControlLeft,
        0x3C => ShiftRight,
        0x3D => AltRight,
        0x3E => ControlRight,
        0x40 => F17,
        0x41 => NumpadDecimal,
        0x43 => NumpadMultiply,
        0x45 => NumpadAdd,
        0x47 => NumLock, // kVK_ANSI_KeypadClear
        0x4B => NumpadDivide,
        0x4C => NumpadEnter,
        0x4E => NumpadSubtract,
        0x4F => F18,
        0x50 => F19,
        0x52 => Numpad0,
        0x53 => Numpad1,
        0x54 => Numpad2,
        0x55 => Numpad3,
        0x56 => Numpad4,
        0x57 => Numpad5,
        0x58 => Numpad6,
        0x59 => Numpad7,
        0x5A => F20,
        0x5B => Numpad8,
        0x5C => Numpad9,
        0x60 => F5,
        0x61 => F6,
        0x62 => F7,
        0x63 => F3,
        0x64 => F8,
        0x65 => F9,
        0x67 => F11,
        0x69 => F13,
        0x6A => F16,
        0x6B => F14,
        0x6D => F10,
        0x6E => ContextMenu,
        0x6F => F12,
        0x71 => F15,
        0x72 => Insert, // kVK_Help
        0x73 => Home,
        0x74 => PageUp,
        0x75 => Delete, // kVK_ForwardDelete
        0x76 => F4,
        0x77 => End,
        0x78 => F2,
        0x79 => PageDown,
        0x7A => F1,
        0x7B => ArrowLeft,
        0x7C => ArrowRight,
        0x7D => ArrowDown,
        0x7E => ArrowUp,
        _ => Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use KeyCode::*;

    #[test]
    fn test_cg_keycodes_map_to_expected_key_codes() {
        let cases: &[(u16, KeyCode)] = &[
            (0x00, KeyA),
            (0x06, KeyZ),
            (0x1D, Digit0),
            (0x24, Enter),
            (0x33, Backspace),
            (0x75, Delete),
            (0x37, MetaLeft),
            (0x3D, AltRight),
            (0x7A, F1),
            (0x6F, F12),
            (0x4C, NumpadEnter),
            (0x7E, ArrowUp),
        ];

        for &(code, expected) in cases {
            assert_eq!(cg_keycode_to_key_code(code), expected, "kVK 0x{code:02X}");
        }
    }

    #[test]
    fn test_function_key_and_unassigned_codes_are_unknown() {
        // kVK_Function, kVK_VolumeUp, out of table
        for code in [0x3F, 0x48, 0x80, 0xFFFF] {
            assert_eq!(cg_keycode_to_key_code(code), Unknown);
        }
    }
}
