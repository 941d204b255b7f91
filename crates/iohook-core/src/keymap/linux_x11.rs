//! X11 KeySyms → [`KeyCode`].
//!
//! The XRecord backend resolves each hardware keycode to the keysym of its
//! first (unshifted) level and hands that keysym to the normalizer.  Letters
//! therefore usually arrive in lowercase, but uppercase is accepted as well so
//! a caller that resolved with Shift applied gets the same result.
//!
//! Keysym values come from `X11/keysymdef.h`.

use super::key_code::KeyCode;

/// Translates a keysym to the canonical key code.
pub fn keysym_to_key_code(keysym: u32) -> KeyCode {
    use KeyCode::*;

    match keysym {
        // a..z and A..Z
        0x61..=0x7A => letter(keysym - 0x61),
        0x41..=0x5A => letter(keysym - 0x41),
        0x30 => Digit0,
        0x31..=0x39 => digit(keysym - 0x31),

        0x20 => Space,
        0x27 => Quote,
        0x2C => Comma,
        0x2D => Minus,
        0x2E => Period,
        0x2F => Slash,
        0x3B => Semicolon,
        0x3C => IntlBackslash, // less
        0x3D => Equal,
        0x5B => BracketLeft,
        0x5C => Backslash,
        0x5D => BracketRight,
        0x60 => Backquote,

        0xFF08 => Backspace,
        0xFF09 | 0xFE20 => Tab, // Tab, ISO_Left_Tab
        0xFF0D => Enter,
        0xFF13 => Pause,
        0xFF14 => ScrollLock,
        0xFF1B => Escape,
        0xFF50 => Home,
        0xFF51 => ArrowLeft,
        0xFF52 => ArrowUp,
        0xFF53 => ArrowRight,
        0xFF54 => ArrowDown,
        0xFF55 => PageUp,
        0xFF56 => PageDown,
        0xFF57 => End,
        0xFF61 => PrintScreen,
        0xFF63 => Insert,
        0xFF67 => ContextMenu,
        0xFFFF => Delete,

        0xFF7F => NumLock,
        0xFF8D => NumpadEnter,
        0xFFAA => NumpadMultiply,
        0xFFAB => NumpadAdd,
        0xFFAD => NumpadSubtract,
        0xFFAE | 0xFF9F => NumpadDecimal, // KP_Decimal, KP_Delete
        0xFFAF => NumpadDivide,
        0xFFB0 | 0xFF9E => Numpad0, // KP_0, KP_Insert
        0xFFB1..=0xFFB9 => numpad(keysym - 0xFFB1),
        // Keypad navigation keysyms, reported while NumLock is off.
        0xFF9C => Numpad1,
        0xFF99 => Numpad2,
        0xFF9B => Numpad3,
        0xFF96 => Numpad4,
        0xFF9D => Numpad5,
        0xFF98 => Numpad6,
        0xFF95 => Numpad7,
        0xFF97 => Numpad8,
        0xFF9A => Numpad9,

        0xFFBE..=0xFFD5 => function(keysym - 0xFFBE),

        0xFFE1 => ShiftLeft,
        0xFFE2 => ShiftRight,
        0xFFE3 => ControlLeft,
        0xFFE4 => ControlRight,
        0xFFE5 => CapsLock,
        0xFFE7 | 0xFFEB => MetaLeft,  // Meta_L, Super_L
        0xFFE8 | 0xFFEC => MetaRight, // Meta_R, Super_R
        0xFFE9 => AltLeft,
        0xFFEA | 0xFE03 => AltRight, // Alt_R, ISO_Level3_Shift (AltGr)

        _ => Unknown,
    }
}

/// Returns the character a keysym stands for, if it is printable.
///
/// Covers Latin-1 keysyms (identical to their code points) and the Unicode
/// keysym range `0x0100_0000 + code point`.
pub fn keysym_to_char(keysym: u32) -> Option<char> {
    match keysym {
        0x20..=0x7E | 0xA0..=0xFF => char::from_u32(keysym),
        0x0100_0100..=0x0110_FFFF => char::from_u32(keysym - 0x0100_0000),
        _ => None,
    }
}

fn letter(offset: u32) -> KeyCode {
    KeyCode::from_u16(KeyCode::KeyA.as_u16() + offset as u16)
}

fn digit(offset: u32) -> KeyCode {
    KeyCode::from_u16(KeyCode::Digit1.as_u16() + offset as u16)
}

fn numpad(offset: u32) -> KeyCode {
    KeyCode::from_u16(KeyCode::Numpad1.as_u16() + offset as u16)
}

fn function(offset: u32) -> KeyCode {
    // F1..F12 and F13..F24 are two separate HID blocks.
    if offset < 12 {
        KeyCode::from_u16(KeyCode::F1.as_u16() + offset as u16)
    } else {
        KeyCode::from_u16(KeyCode::F13.as_u16() + (offset - 12) as u16)
    }
}
