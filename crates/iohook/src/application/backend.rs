//! Contract between the lifecycle controller and the OS hook backends.
//!
//! A backend owns the OS-specific registration.  The controller calls
//! [`PlatformBackend::install_hook`] on a dedicated thread and the backend
//! keeps that thread inside its OS loop until
//! [`PlatformBackend::uninstall_hook`] is called from elsewhere.  Each
//! occurrence is pushed synchronously through the [`EventSink`] it was
//! given; the sink normalizes and queues it and never blocks.
//!
//! The first thing a backend pushes after a successful registration must be
//! a `HookEnabled` native event.  That is what releases the caller blocked in
//! `start()`; anything pushed before it is discarded.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use iohook_core::{normalize, NativeEvent, NativeKind};
use thiserror::Error;

use super::lifecycle::SessionShared;
use super::logger::Logger;

// ── Errors ───────────────────────────────────────────────────────────────────

/// Broad class of an engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An OS resource (display, hook, tap, run loop, permission) could not
    /// be obtained.
    ResourceAcquisition,
    Allocation,
    /// A worker thread could not be spawned.
    ThreadCreate,
}

/// Failure reported by a backend.
///
/// These are leaf errors: the engine does not retry them.  [`HookError::code`]
/// gives the stable numeric status for embedders.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HookError {
    #[error("out of memory")]
    OutOfMemory,

    #[error("failed to open X display: {0}")]
    OpenDisplay(String),

    #[error("XRecord extension is not available")]
    RecordNotFound,

    #[error("failed to allocate XRecord range")]
    RecordAllocRange,

    #[error("failed to create XRecord context")]
    RecordCreateContext,

    #[error("failed to enable XRecord context")]
    RecordEnableContext,

    #[error("failed to register low-level hook: {0}")]
    SetWindowsHook(String),

    #[error("accessibility access is not enabled for this process")]
    AccessibilityDisabled,

    #[error("failed to create event tap")]
    CreateEventPort,

    #[error("failed to create run loop source")]
    CreateRunLoopSource,

    #[error("failed to get the current run loop")]
    GetRunLoop,

    #[error("failed to create run loop observer")]
    CreateObserver,

    #[error("another native hook backend is already active in this process")]
    BackendInUse,

    #[error("no hook backend is available for this platform")]
    UnsupportedPlatform,

    #[error("hook failure: {0}")]
    Failure(String),
}

impl HookError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HookError::OutOfMemory | HookError::RecordAllocRange => ErrorKind::Allocation,
            _ => ErrorKind::ResourceAcquisition,
        }
    }

    /// Stable numeric status.
    pub fn code(&self) -> u16 {
        match self {
            HookError::Failure(_) | HookError::BackendInUse | HookError::UnsupportedPlatform => {
                0x01
            }
            HookError::OutOfMemory => 0x02,
            HookError::OpenDisplay(_) => 0x20,
            HookError::RecordNotFound => 0x21,
            HookError::RecordAllocRange => 0x22,
            HookError::RecordCreateContext => 0x23,
            HookError::RecordEnableContext => 0x24,
            HookError::SetWindowsHook(_) => 0x30,
            HookError::AccessibilityDisabled => 0x40,
            HookError::CreateEventPort => 0x41,
            HookError::CreateRunLoopSource => 0x42,
            HookError::GetRunLoop => 0x43,
            HookError::CreateObserver => 0x44,
        }
    }
}

// ── Backend trait ────────────────────────────────────────────────────────────

/// OS hook implementation. One variant is compiled per target, plus the
/// scripted backend used in tests.
#[cfg_attr(test, mockall::automock)]
pub trait PlatformBackend: Send + Sync {
    /// Short name for log messages.
    fn name(&self) -> &'static str;

    /// Installs the hook and services it on the calling thread until
    /// [`PlatformBackend::uninstall_hook`] is called.
    ///
    /// Must push a `HookEnabled` native event once registration succeeded.
    /// Returns `Err` when registration fails; returns `Ok` after a requested
    /// uninstall.
    fn install_hook(&self, sink: EventSink) -> Result<(), HookError>;

    /// Asks a running `install_hook` to unregister and return.  Callable
    /// from any thread; a no-op when nothing is installed.
    fn uninstall_hook(&self) -> Result<(), HookError>;
}

// ── Event sink ───────────────────────────────────────────────────────────────

/// Where a backend pushes native occurrences. Cheap to clone.
#[derive(Clone)]
pub struct EventSink {
    session: Arc<SessionShared>,
}

impl EventSink {
    pub(crate) fn new(session: Arc<SessionShared>) -> Self {
        EventSink { session }
    }

    pub(crate) fn shared(&self) -> Arc<SessionShared> {
        Arc::clone(&self.session)
    }

    /// Normalizes `native` and queues it for delivery. Never blocks.
    ///
    /// Input events are discarded while the engine is paused; hook status
    /// events are not.
    pub fn dispatch(&self, native: NativeEvent) {
        let session = &self.session;

        match native.kind {
            NativeKind::HookEnabled => {
                session.enabled.store(true, Ordering::SeqCst);
                session.latch.signal_enabled();
            }
            NativeKind::HookDisabled => {}
            _ if !session.enabled.load(Ordering::SeqCst) => {
                session
                    .logger
                    .debug("dropping native event received before the hook was enabled");
                return;
            }
            _ => {}
        }

        if native.is_hook_status() {
            if !session.deliver_hook_events {
                return;
            }
        } else if session.paused.load(Ordering::SeqCst) {
            return;
        }
        session.queue.enqueue(normalize(&native));
    }

    /// `true` once `HookEnabled` was pushed.
    pub fn is_enabled(&self) -> bool {
        self.session.enabled.load(Ordering::SeqCst)
    }

    pub fn logger(&self) -> &Logger {
        &self.session.logger
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_the_published_status_table() {
        // Arrange
        let cases = [
            (HookError::Failure("x".into()), 0x01),
            (HookError::OutOfMemory, 0x02),
            (HookError::OpenDisplay(":0".into()), 0x20),
            (HookError::RecordEnableContext, 0x24),
            (HookError::SetWindowsHook("denied".into()), 0x30),
            (HookError::AccessibilityDisabled, 0x40),
            (HookError::GetRunLoop, 0x43),
        ];

        for (error, code) in cases {
            // Act / Assert
            assert_eq!(error.code(), code, "{error}");
        }
    }

    #[test]
    fn test_allocation_failures_are_classified_apart() {
        assert_eq!(HookError::OutOfMemory.kind(), ErrorKind::Allocation);
        assert_eq!(HookError::RecordAllocRange.kind(), ErrorKind::Allocation);
        assert_eq!(
            HookError::AccessibilityDisabled.kind(),
            ErrorKind::ResourceAcquisition
        );
    }
}
