//! Raw occurrences as a backend reports them, before normalization.
//!
//! A [`NativeEvent`] is plain data: it carries the platform's own key code,
//! modifier word, button ordinal and wheel delta untouched, tagged with the
//! [`Platform`] whose conventions they follow.  Every platform's variant
//! compiles on every target so the normalizer can be tested anywhere.

use serde::{Deserialize, Serialize};

/// Whose conventions a [`NativeEvent`] follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Low-level hooks. Time in milliseconds, modifiers in the layout of
    /// [`crate::normalize::modifiers::windows_modifier_bit`].
    Windows,
    /// XRecord. Time in server milliseconds, modifiers are the core `state`
    /// field.
    X11,
    /// Quartz event tap. Time in nanoseconds, modifiers are `CGEventFlags`
    /// with held buttons in bits 32..=36.
    Quartz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeEvent {
    pub platform: Platform,
    /// Platform timestamp; see [`Platform`] for the unit.
    pub time: u64,
    /// Platform modifier word; see [`Platform`] for the layout.
    pub modifiers: u64,
    pub kind: NativeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeKind {
    HookEnabled,
    HookDisabled,
    KeyDown(NativeKey),
    KeyUp(NativeKey),
    /// A key press that produced a printable character.
    KeyTyped(NativeKey, char),
    ButtonDown(NativeButton),
    ButtonUp(NativeButton),
    /// Press and release without movement in between.
    ButtonClick(NativeButton),
    Motion { x: i32, y: i32 },
    Wheel(NativeWheel),
}

/// Key identity in platform terms.
///
/// `code` is the VK (Windows), keysym (X11) or `CGKeyCode` (Quartz).
/// `scan_code` is the hardware code when the platform has one separate from
/// `code` (Windows scan code, X11 keycode); it becomes the event's raw code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeKey {
    pub code: u32,
    pub scan_code: u32,
    pub extended: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeButton {
    /// Platform button ordinal.
    pub button: u8,
    pub clicks: u16,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelAxis {
    Vertical,
    Horizontal,
}

/// Wheel motion in platform units.
///
/// Windows: multiples of 120, positive away from the user or to the right.
/// X11: one per button event, +1 for buttons 4 and 7, -1 for 5 and 6.
/// Quartz: line delta, positive up (axis 1) or left (axis 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeWheel {
    pub axis: WheelAxis,
    pub delta: i32,
    /// Lines per notch as configured in the OS.
    pub amount: u16,
    /// The OS scrolls by pages instead of lines.
    pub page: bool,
    pub x: i32,
    pub y: i32,
}

impl NativeEvent {
    pub fn new(platform: Platform, time: u64, modifiers: u64, kind: NativeKind) -> Self {
        NativeEvent {
            platform,
            time,
            modifiers,
            kind,
        }
    }

    pub fn is_hook_status(&self) -> bool {
        matches!(self.kind, NativeKind::HookEnabled | NativeKind::HookDisabled)
    }
}
