//! Windows virtual-key codes → [`KeyCode`].
//!
//! `WH_KEYBOARD_LL` reports a `vkCode` (0x00-0xFF) plus an "extended" flag.
//! The extended flag is what separates the numpad Enter from the main Enter,
//! and the right Ctrl/Alt from the left ones when Windows reports the generic
//! `VK_CONTROL`/`VK_MENU` codes.
//!
//! Reference: <https://learn.microsoft.com/windows/win32/inputdev/virtual-key-codes>

use super::key_code::KeyCode;

pub const VK_SHIFT: u32 = 0x10;
pub const VK_CONTROL: u32 = 0x11;
pub const VK_MENU: u32 = 0x12;
pub const VK_RETURN: u32 = 0x0D;

/// Scan code Windows reports for the right Shift key.
const SCAN_RIGHT_SHIFT: u32 = 0x36;

/// Resolves a virtual key from a low-level keyboard hook.
///
/// `scan_code` and `extended` come straight from `KBDLLHOOKSTRUCT`; they are
/// only consulted for keys whose side or block the VK alone cannot tell.
pub fn vk_to_key_code(vk: u32, scan_code: u32, extended: bool) -> KeyCode {
    match vk {
        VK_RETURN if extended => KeyCode::NumpadEnter,
        VK_SHIFT if scan_code == SCAN_RIGHT_SHIFT => KeyCode::ShiftRight,
        VK_SHIFT => KeyCode::ShiftLeft,
        VK_CONTROL if extended => KeyCode::ControlRight,
        VK_CONTROL => KeyCode::ControlLeft,
        VK_MENU if extended => KeyCode::AltRight,
        VK_MENU => KeyCode::AltLeft,
        _ => VK_TABLE.get(vk as usize).copied().unwrap_or(KeyCode::Unknown),
    }
}

/// Position-indexed VK table; unmapped slots hold [`KeyCode::Unknown`].
const VK_TABLE: [KeyCode; 256] = {
    use KeyCode::*;
    let mut t = [Unknown; 256];

    // VK_A..VK_Z match ASCII; the HID letters are contiguous too.
    let letters = [
        KeyA, KeyB, KeyC, KeyD, KeyE, KeyF, KeyG, KeyH, KeyI, KeyJ, KeyK, KeyL, KeyM, KeyN,
        KeyO, KeyP, KeyQ, KeyR, KeyS, KeyT, KeyU, KeyV, KeyW, KeyX, KeyY, KeyZ,
    ];
    let mut i = 0;
    while i < letters.len() {
        t[0x41 + i] = letters[i];
        i += 1;
    }

    let digits = [Digit0, Digit1, Digit2, Digit3, Digit4, Digit5, Digit6, Digit7, Digit8, Digit9];
    let numpad = [
        Numpad0, Numpad1, Numpad2, Numpad3, Numpad4, Numpad5, Numpad6, Numpad7, Numpad8, Numpad9,
    ];
    let mut i = 0;
    while i < 10 {
        t[0x30 + i] = digits[i];
        t[0x60 + i] = numpad[i];
        i += 1;
    }

    // VK_F1 (0x70) .. VK_F24 (0x87)
    let functions = [
        F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12, F13, F14, F15, F16, F17, F18, F19,
        F20, F21, F22, F23, F24,
    ];
    let mut i = 0;
    while i < functions.len() {
        t[0x70 + i] = functions[i];
        i += 1;
    }

    t[0x08] = Backspace;
    t[0x09] = Tab;
    t[0x0D] = Enter;
    t[0x13] = Pause;
    t[0x14] = CapsLock;
    t[0x1B] = Escape;
    t[0x20] = Space;
    t[0x21] = PageUp;
    t[0x22] = PageDown;
    t[0x23] = End;
    t[0x24] = Home;
    t[0x25] = ArrowLeft;
    t[0x26] = ArrowUp;
    t[0x27] = ArrowRight;
    t[0x28] = ArrowDown;
    t[0x2C] = PrintScreen;
    t[0x2D] = Insert;
    t[0x2E] = Delete;
    t[0x5B] = MetaLeft;
    t[0x5C] = MetaRight;
    t[0x5D] = ContextMenu;

    t[0x6A] = NumpadMultiply;
    t[0x6B] = NumpadAdd;
    t[0x6D] = NumpadSubtract;
    t[0x6E] = NumpadDecimal;
    t[0x6F] = NumpadDivide;
    t[0x90] = NumLock;
    t[0x91] = ScrollLock;

    t[0xA0] = ShiftLeft;
    t[0xA1] = ShiftRight;
    t[0xA2] = ControlLeft;
    t[0xA3] = ControlRight;
    t[0xA4] = AltLeft;
    t[0xA5] = AltRight;

    // OEM keys, US layout positions.
    t[0xBA] = Semicolon;
    t[0xBB] = Equal;
    t[0xBC] = Comma;
    t[0xBD] = Minus;
    t[0xBE] = Period;
    t[0xBF] = Slash;
    t[0xC0] = Backquote;
    t[0xDB] = BracketLeft;
    t[0xDC] = Backslash;
    t[0xDD] = BracketRight;
    t[0xDE] = Quote;
    t[0xE2] = IntlBackslash;

    t
};

#[cfg(test)]
mod tests {
    use super::*;
    use KeyCode::*;

    #[test]
    fn test_plain_vk_codes_map_through_the_table() {
        // Arrange
        let cases: &[(u32, KeyCode)] = &[
            (0x41, KeyA),
            (0x5A, KeyZ),
            (0x30, Digit0),
            (0x39, Digit9),
            (0x60, Numpad0),
            (0x70, F1),
            (0x7B, F12),
            (0x87, F24),
            (0x1B, Escape),
            (0xA1, ShiftRight),
            (0x5B, MetaLeft),
            (0xC0, Backquote),
        ];

        for &(vk, expected) in cases {
            // Act
            let code = vk_to_key_code(vk, 0, false);

            // Assert
            assert_eq!(code, expected, "VK 0x{vk:02X}");
        }
    }

    #[test]
    fn test_extended_return_is_numpad_enter() {
        assert_eq!(vk_to_key_code(VK_RETURN, 0x1C, true), NumpadEnter);
        assert_eq!(vk_to_key_code(VK_RETURN, 0x1C, false), Enter);
    }

    #[test]
    fn test_generic_modifiers_are_resolved_to_a_side() {
        assert_eq!(vk_to_key_code(VK_CONTROL, 0x1D, true), ControlRight);
        assert_eq!(vk_to_key_code(VK_CONTROL, 0x1D, false), ControlLeft);
        assert_eq!(vk_to_key_code(VK_MENU, 0x38, true), AltRight);
        assert_eq!(vk_to_key_code(VK_SHIFT, 0x36, false), ShiftRight);
        assert_eq!(vk_to_key_code(VK_SHIFT, 0x2A, false), ShiftLeft);
    }

    #[test]
    fn test_mouse_and_out_of_range_codes_are_unknown() {
        // VK_LBUTTON, VK_RBUTTON, VK_BROWSER_BACK, beyond one byte
        for vk in [0x01, 0x02, 0xA6, 0x1_0000] {
            assert_eq!(vk_to_key_code(vk, 0, false), Unknown, "VK 0x{vk:X}");
        }
    }
}
