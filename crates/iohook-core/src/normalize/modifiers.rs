//! Platform modifier words and button ordinals → canonical form.

use crate::event::{ModifierMask, MouseButton};
use crate::native::Platform;

// ── Windows ──────────────────────────────────────────────────────────────────

/// Virtual keys tracked in the Windows modifier word, bit `i` for entry `i`.
///
/// Low-level hooks deliver no modifier state, so the backend keeps this word
/// itself from the key and button events it sees.
const WINDOWS_TRACKED_VKS: [(u32, u16); 16] = [
    (0x01, ModifierMask::BUTTON1),     // VK_LBUTTON
    (0x02, ModifierMask::BUTTON2),     // VK_RBUTTON
    (0x04, ModifierMask::BUTTON3),     // VK_MBUTTON
    (0x05, ModifierMask::BUTTON4),     // VK_XBUTTON1
    (0x06, ModifierMask::BUTTON5),     // VK_XBUTTON2
    (0x14, ModifierMask::CAPS_LOCK),   // VK_CAPITAL
    (0x5B, ModifierMask::META_L),      // VK_LWIN
    (0x5C, ModifierMask::META_R),      // VK_RWIN
    (0x90, ModifierMask::NUM_LOCK),    // VK_NUMLOCK
    (0x91, ModifierMask::SCROLL_LOCK), // VK_SCROLL
    (0xA0, ModifierMask::SHIFT_L),     // VK_LSHIFT
    (0xA1, ModifierMask::SHIFT_R),     // VK_RSHIFT
    (0xA2, ModifierMask::CTRL_L),      // VK_LCONTROL
    (0xA3, ModifierMask::CTRL_R),      // VK_RCONTROL
    (0xA4, ModifierMask::ALT_L),       // VK_LMENU
    (0xA5, ModifierMask::ALT_R),       // VK_RMENU
];

/// Bit of the Windows modifier word that tracks `vk`, if any.
pub fn windows_modifier_bit(vk: u32) -> Option<u64> {
    WINDOWS_TRACKED_VKS
        .iter()
        .position(|&(tracked, _)| tracked == vk)
        .map(|index| 1u64 << index)
}

/// `true` for the three keys whose bit is a toggle rather than a held state.
pub fn windows_is_lock_vk(vk: u32) -> bool {
    matches!(vk, 0x14 | 0x90 | 0x91)
}

fn windows_mask(word: u64) -> ModifierMask {
    let bits = WINDOWS_TRACKED_VKS
        .iter()
        .enumerate()
        .filter(|(index, _)| word & (1u64 << index) != 0)
        .fold(0u16, |acc, (_, &(_, bit))| acc | bit);
    ModifierMask(bits)
}

// ── X11 ──────────────────────────────────────────────────────────────────────

const X_SHIFT: u64 = 1 << 0;
const X_LOCK: u64 = 1 << 1;
const X_CONTROL: u64 = 1 << 2;
const X_MOD1: u64 = 1 << 3; // Alt
const X_MOD2: u64 = 1 << 4; // NumLock
const X_MOD4: u64 = 1 << 6; // Super
const X_BUTTON1: u64 = 1 << 8;
const X_BUTTON2: u64 = 1 << 9;
const X_BUTTON3: u64 = 1 << 10;

/// X11 `state` cannot tell left from right, so the left bits are reported.
fn x11_mask(state: u64) -> ModifierMask {
    const PAIRS: [(u64, u16); 9] = [
        (X_SHIFT, ModifierMask::SHIFT_L),
        (X_LOCK, ModifierMask::CAPS_LOCK),
        (X_CONTROL, ModifierMask::CTRL_L),
        (X_MOD1, ModifierMask::ALT_L),
        (X_MOD2, ModifierMask::NUM_LOCK),
        (X_MOD4, ModifierMask::META_L),
        (X_BUTTON1, ModifierMask::BUTTON1),
        // X11 button 2 is the middle button, 3 the right one.
        (X_BUTTON2, ModifierMask::BUTTON3),
        (X_BUTTON3, ModifierMask::BUTTON2),
    ];
    ModifierMask(
        PAIRS
            .iter()
            .filter(|(x, _)| state & x != 0)
            .fold(0, |acc, (_, bit)| acc | bit),
    )
}

// ── Quartz ───────────────────────────────────────────────────────────────────

const CG_ALPHA_SHIFT: u64 = 0x0001_0000;
const CG_SHIFT: u64 = 0x0002_0000;
const CG_CONTROL: u64 = 0x0004_0000;
const CG_ALTERNATE: u64 = 0x0008_0000;
const CG_COMMAND: u64 = 0x0010_0000;

// Device-dependent side bits (NX_DEVICE*KEYMASK).
const NX_LCTL: u64 = 0x0000_0001;
const NX_LSHIFT: u64 = 0x0000_0002;
const NX_RSHIFT: u64 = 0x0000_0004;
const NX_LCMD: u64 = 0x0000_0008;
const NX_RCMD: u64 = 0x0000_0010;
const NX_LALT: u64 = 0x0000_0020;
const NX_RALT: u64 = 0x0000_0040;
const NX_RCTL: u64 = 0x0000_2000;

/// First bit of the held-button field the Quartz backend appends.
pub const QUARTZ_BUTTON_SHIFT: u32 = 32;

fn quartz_side(flags: u64, generic: u64, left: u64, right: u64, l: u16, r: u16) -> u16 {
    if flags & generic == 0 {
        return 0;
    }
    let mut bits = 0;
    if flags & left != 0 {
        bits |= l;
    }
    if flags & right != 0 {
        bits |= r;
    }
    // Some devices set only the generic flag.
    if bits == 0 {
        l
    } else {
        bits
    }
}

fn quartz_mask(flags: u64) -> ModifierMask {
    const SIDES: [(u64, u64, u64, u16, u16); 4] = [
        (CG_SHIFT, NX_LSHIFT, NX_RSHIFT, ModifierMask::SHIFT_L, ModifierMask::SHIFT_R),
        (CG_CONTROL, NX_LCTL, NX_RCTL, ModifierMask::CTRL_L, ModifierMask::CTRL_R),
        (CG_ALTERNATE, NX_LALT, NX_RALT, ModifierMask::ALT_L, ModifierMask::ALT_R),
        (CG_COMMAND, NX_LCMD, NX_RCMD, ModifierMask::META_L, ModifierMask::META_R),
    ];
    let mut bits = SIDES
        .iter()
        .fold(0, |acc, &(generic, left, right, l, r)| {
            acc | quartz_side(flags, generic, left, right, l, r)
        });
    if flags & CG_ALPHA_SHIFT != 0 {
        bits |= ModifierMask::CAPS_LOCK;
    }
    for ordinal in 0..5u8 {
        if flags & (1u64 << (QUARTZ_BUTTON_SHIFT + u32::from(ordinal))) != 0 {
            bits |= button(Platform::Quartz, ordinal).mask_bit();
        }
    }
    ModifierMask(bits)
}

// ── Dispatch on platform ─────────────────────────────────────────────────────

pub fn mask(platform: Platform, word: u64) -> ModifierMask {
    match platform {
        Platform::Windows => windows_mask(word),
        Platform::X11 => x11_mask(word),
        Platform::Quartz => quartz_mask(word),
    }
}

/// Platform button ordinal → canonical button; unknown ordinals give
/// [`MouseButton::NoButton`].
pub fn button(platform: Platform, ordinal: u8) -> MouseButton {
    use MouseButton::*;
    match (platform, ordinal) {
        (Platform::Windows, 1) | (Platform::X11, 1) | (Platform::Quartz, 0) => Button1,
        (Platform::Windows, 2) | (Platform::X11, 3) | (Platform::Quartz, 1) => Button2,
        (Platform::Windows, 3) | (Platform::X11, 2) | (Platform::Quartz, 2) => Button3,
        (Platform::Windows, 4) | (Platform::X11, 8) | (Platform::Quartz, 3) => Button4,
        (Platform::Windows, 5) | (Platform::X11, 9) | (Platform::Quartz, 4) => Button5,
        _ => NoButton,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_word_built_from_vks_maps_to_sided_bits() {
        // Arrange
        let word = [0xA1, 0xA2, 0x01]
            .iter()
            .filter_map(|&vk| windows_modifier_bit(vk))
            .fold(0, |acc, bit| acc | bit);

        // Act
        let result = mask(Platform::Windows, word);

        // Assert
        assert_eq!(
            result.bits(),
            ModifierMask::SHIFT_R | ModifierMask::CTRL_L | ModifierMask::BUTTON1
        );
    }

    #[test]
    fn test_windows_untracked_vk_has_no_bit() {
        assert_eq!(windows_modifier_bit(0x41), None);
        assert!(windows_is_lock_vk(0x14));
        assert!(!windows_is_lock_vk(0xA0));
    }

    #[test]
    fn test_x11_state_swaps_middle_and_right_buttons() {
        // Button2Mask (middle) and Mod4Mask (Super)
        let result = mask(Platform::X11, X_BUTTON2 | X_MOD4);

        assert_eq!(result.bits(), ModifierMask::BUTTON3 | ModifierMask::META_L);
    }

    #[test]
    fn test_quartz_uses_device_bits_for_sides_and_falls_back_to_left() {
        let right_cmd = mask(Platform::Quartz, CG_COMMAND | NX_RCMD);
        let generic_alt = mask(Platform::Quartz, CG_ALTERNATE);
        let stale_side_bit = mask(Platform::Quartz, NX_LSHIFT);

        assert_eq!(right_cmd.bits(), ModifierMask::META_R);
        assert_eq!(generic_alt.bits(), ModifierMask::ALT_L);
        assert_eq!(stale_side_bit.bits(), 0);
    }

    #[test]
    fn test_quartz_held_buttons_come_from_high_bits() {
        // Quartz ordinal 1 is the right button.
        let result = mask(Platform::Quartz, 1u64 << (QUARTZ_BUTTON_SHIFT + 1));
        assert_eq!(result.bits(), ModifierMask::BUTTON2);
    }

    #[test]
    fn test_button_ordinals_agree_on_meaning_across_platforms() {
        assert_eq!(button(Platform::Windows, 2), MouseButton::Button2);
        assert_eq!(button(Platform::X11, 3), MouseButton::Button2);
        assert_eq!(button(Platform::Quartz, 1), MouseButton::Button2);
        assert_eq!(button(Platform::X11, 9), MouseButton::Button5);
        assert_eq!(button(Platform::X11, 4), MouseButton::NoButton);
        assert_eq!(button(Platform::Windows, 0), MouseButton::NoButton);
    }
}
