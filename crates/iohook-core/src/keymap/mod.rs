//! Key code translation tables.
//!
//! The canonical representation is [`KeyCode`] (USB HID usage IDs).  Each
//! platform module translates *from* the native vocabulary; the engine only
//! observes input, so there is no reverse direction.

pub mod key_code;
pub mod linux_x11;
pub mod macos_cg;
pub mod windows_vk;

pub use key_code::KeyCode;

/// Single entry point over the per-platform tables.
pub struct KeyMapper;

impl KeyMapper {
    /// Windows virtual key, with the scan code and extended flag from the hook.
    pub fn from_windows_vk(vk: u32, scan_code: u32, extended: bool) -> KeyCode {
        windows_vk::vk_to_key_code(vk, scan_code, extended)
    }

    /// X11 keysym, as resolved from the hardware keycode.
    pub fn from_x11_keysym(keysym: u32) -> KeyCode {
        linux_x11::keysym_to_key_code(keysym)
    }

    /// macOS `CGKeyCode`.
    pub fn from_macos_keycode(code: u16) -> KeyCode {
        macos_cg::cg_keycode_to_key_code(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letter_a_is_the_same_key_on_every_platform() {
        // Arrange / Act
        let windows = KeyMapper::from_windows_vk(0x41, 0x1E, false);
        let x11 = KeyMapper::from_x11_keysym(0x61);
        let macos = KeyMapper::from_macos_keycode(0x00);

        // Assert
        assert_eq!(windows, KeyCode::KeyA);
        assert_eq!(x11, KeyCode::KeyA);
        assert_eq!(macos, KeyCode::KeyA);
    }

    #[test]
    fn test_left_and_right_meta_stay_distinct_on_every_platform() {
        assert_ne!(
            KeyMapper::from_windows_vk(0x5B, 0, true),
            KeyMapper::from_windows_vk(0x5C, 0, true)
        );
        assert_ne!(
            KeyMapper::from_x11_keysym(0xFFEB),
            KeyMapper::from_x11_keysym(0xFFEC)
        );
        assert_ne!(
            KeyMapper::from_macos_keycode(0x37),
            KeyMapper::from_macos_keycode(0x36)
        );
    }
}
