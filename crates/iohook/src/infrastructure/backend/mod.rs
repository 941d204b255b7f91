//! OS hook backends.
//!
//! One native backend is compiled per target:
//!
//! - **Windows**: `WH_KEYBOARD_LL` / `WH_MOUSE_LL` hooks serviced by a Win32
//!   message loop on the hook thread.
//! - **Linux**: the XRecord extension over a dedicated Xlib data connection.
//! - **macOS**: a listen-only Quartz event tap on the hook thread's
//!   `CFRunLoop`.
//!
//! [`mock::MockBackend`] is always available for tests and for embedding the
//! engine without an OS hook.
//!
//! OS hooks are process-wide, so a native backend holds a [`BackendClaim`]
//! for as long as it exists; a second one cannot be built until the first is
//! dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::application::backend::{HookError, PlatformBackend};
use crate::config::HookConfig;

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "linux")]
pub mod x11;

#[cfg(target_os = "macos")]
pub mod macos;

static NATIVE_BACKEND_CLAIMED: AtomicBool = AtomicBool::new(false);

/// Process-wide token held by the native backend instance.
#[derive(Debug)]
pub struct BackendClaim {
    _private: (),
}

impl BackendClaim {
    /// # Errors
    ///
    /// [`HookError::BackendInUse`] while another claim is alive.
    pub fn acquire() -> Result<Self, HookError> {
        NATIVE_BACKEND_CLAIMED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| BackendClaim { _private: () })
            .map_err(|_| HookError::BackendInUse)
    }
}

impl Drop for BackendClaim {
    fn drop(&mut self) {
        NATIVE_BACKEND_CLAIMED.store(false, Ordering::SeqCst);
    }
}

/// Builds the native backend for the current target.
///
/// # Errors
///
/// [`HookError::BackendInUse`] if a native backend already exists in this
/// process, [`HookError::UnsupportedPlatform`] on targets without one, or
/// a load failure from the backend itself.
pub fn default_backend(config: &HookConfig) -> Result<Arc<dyn PlatformBackend>, HookError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Arc::new(windows::WindowsBackend::new(config)?))
    }

    #[cfg(target_os = "linux")]
    {
        Ok(Arc::new(x11::X11Backend::new(config)?))
    }

    #[cfg(target_os = "macos")]
    {
        Ok(Arc::new(macos::MacosBackend::new(config)?))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        let _ = config;
        Err(HookError::UnsupportedPlatform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_is_refused_until_the_first_is_dropped() {
        // Arrange
        let first = BackendClaim::acquire().unwrap();

        // Act
        let second = BackendClaim::acquire();
        drop(first);
        let third = BackendClaim::acquire();

        // Assert
        assert_eq!(second.unwrap_err(), HookError::BackendInUse);
        assert!(third.is_ok());
    }
}
