//! Modifier and mouse-button state carried by every event.

use serde::{Deserialize, Serialize};

/// Bitset of modifier keys, held mouse buttons and lock states.
///
/// Bit positions are stable and exposed to embedders (see the associated
/// constants).  Left and right modifiers are tracked separately; platforms
/// that cannot tell the sides apart report the left bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModifierMask(pub u16);

impl ModifierMask {
    pub const SHIFT_L: u16 = 1 << 0;
    pub const CTRL_L: u16 = 1 << 1;
    pub const META_L: u16 = 1 << 2;
    pub const ALT_L: u16 = 1 << 3;
    pub const SHIFT_R: u16 = 1 << 4;
    pub const CTRL_R: u16 = 1 << 5;
    pub const META_R: u16 = 1 << 6;
    pub const ALT_R: u16 = 1 << 7;
    pub const BUTTON1: u16 = 1 << 8;
    pub const BUTTON2: u16 = 1 << 9;
    pub const BUTTON3: u16 = 1 << 10;
    pub const BUTTON4: u16 = 1 << 11;
    pub const BUTTON5: u16 = 1 << 12;
    pub const NUM_LOCK: u16 = 1 << 13;
    pub const CAPS_LOCK: u16 = 1 << 14;
    pub const SCROLL_LOCK: u16 = 1 << 15;

    pub const SHIFT: u16 = Self::SHIFT_L | Self::SHIFT_R;
    pub const CTRL: u16 = Self::CTRL_L | Self::CTRL_R;
    pub const META: u16 = Self::META_L | Self::META_R;
    pub const ALT: u16 = Self::ALT_L | Self::ALT_R;
    pub const BUTTONS: u16 =
        Self::BUTTON1 | Self::BUTTON2 | Self::BUTTON3 | Self::BUTTON4 | Self::BUTTON5;

    pub const fn empty() -> Self {
        ModifierMask(0)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    /// `true` when every bit of `flags` is set.
    pub const fn contains(self, flags: u16) -> bool {
        self.0 & flags == flags
    }

    /// `true` when at least one bit of `flags` is set.
    pub const fn intersects(self, flags: u16) -> bool {
        self.0 & flags != 0
    }

    #[must_use]
    pub const fn with(self, flags: u16) -> Self {
        ModifierMask(self.0 | flags)
    }

    pub fn shift(self) -> bool {
        self.intersects(Self::SHIFT)
    }

    pub fn ctrl(self) -> bool {
        self.intersects(Self::CTRL)
    }

    pub fn alt(self) -> bool {
        self.intersects(Self::ALT)
    }

    /// Win / Cmd / Super.
    pub fn meta(self) -> bool {
        self.intersects(Self::META)
    }

    /// `true` while any mouse button is held.
    pub fn any_button(self) -> bool {
        self.intersects(Self::BUTTONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_agnostic_queries_accept_either_side() {
        // Arrange
        let left = ModifierMask(ModifierMask::CTRL_L);
        let right = ModifierMask(ModifierMask::CTRL_R);

        // Act / Assert
        assert!(left.ctrl());
        assert!(right.ctrl());
        assert!(!left.shift());
    }

    #[test]
    fn test_any_button_ignores_keyboard_modifiers() {
        let keys_only = ModifierMask(ModifierMask::SHIFT | ModifierMask::CAPS_LOCK);
        assert!(!keys_only.any_button());
        assert!(keys_only.with(ModifierMask::BUTTON3).any_button());
    }

    #[test]
    fn test_contains_requires_all_bits() {
        let mask = ModifierMask::empty().with(ModifierMask::SHIFT_L);
        assert!(mask.contains(ModifierMask::SHIFT_L));
        assert!(!mask.contains(ModifierMask::SHIFT));
        assert!(mask.intersects(ModifierMask::SHIFT));
    }
}
