//! Scripted backend for tests.
//!
//! Behaves like a native backend without touching the OS: `install_hook`
//! reports `HookEnabled` and parks the hook thread until `uninstall_hook`,
//! and [`MockBackend::emit`] stands in for the OS callback.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use iohook_core::{NativeEvent, NativeKind, Platform};

use crate::application::backend::{EventSink, HookError, PlatformBackend};

pub struct MockBackend {
    platform: Platform,
    failure: Option<HookError>,
    state: Mutex<MockState>,
    changed: Condvar,
}

#[derive(Default)]
struct MockState {
    sink: Option<EventSink>,
    stop_requested: bool,
    installs: usize,
    uninstalls: usize,
}

impl MockBackend {
    /// Emits events in Windows conventions.
    pub fn new() -> Self {
        Self::with_platform(Platform::Windows)
    }

    pub fn with_platform(platform: Platform) -> Self {
        MockBackend {
            platform,
            failure: None,
            state: Mutex::new(MockState::default()),
            changed: Condvar::new(),
        }
    }

    /// A backend whose registration always fails with `error`.
    pub fn failing(error: HookError) -> Self {
        MockBackend {
            failure: Some(error),
            ..Self::new()
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Pushes `native` as if the OS had reported it. Returns `false` when no
    /// hook is installed.
    pub fn emit(&self, native: NativeEvent) -> bool {
        let sink = self.lock().sink.clone();
        match sink {
            Some(sink) => {
                sink.dispatch(native);
                true
            }
            None => false,
        }
    }

    /// [`MockBackend::emit`] in this backend's platform conventions.
    pub fn emit_kind(&self, time: u64, modifiers: u64, kind: NativeKind) -> bool {
        self.emit(NativeEvent::new(self.platform, time, modifiers, kind))
    }

    /// Makes the running `install_hook` return without an uninstall, as
    /// when the OS drops a hook.
    pub fn drop_hook(&self) {
        let mut state = self.lock();
        state.stop_requested = true;
        self.changed.notify_all();
    }

    pub fn is_installed(&self) -> bool {
        self.lock().sink.is_some()
    }

    pub fn install_count(&self) -> usize {
        self.lock().installs
    }

    pub fn uninstall_count(&self) -> usize {
        self.lock().uninstalls
    }

    /// Blocks until a hook is installed or `timeout` passes.
    pub fn wait_until_installed(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while state.sink.is_none() {
            let Some(left) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            state = self
                .changed
                .wait_timeout(state, left)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn install_hook(&self, sink: EventSink) -> Result<(), HookError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        {
            let mut state = self.lock();
            state.installs += 1;
            state.stop_requested = false;
            state.sink = Some(sink.clone());
            self.changed.notify_all();
        }
        sink.dispatch(NativeEvent::new(self.platform, 0, 0, NativeKind::HookEnabled));

        let mut state = self.lock();
        while !state.stop_requested {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.sink = None;
        drop(state);

        sink.dispatch(NativeEvent::new(self.platform, 0, 0, NativeKind::HookDisabled));
        Ok(())
    }

    fn uninstall_hook(&self) -> Result<(), HookError> {
        let mut state = self.lock();
        state.uninstalls += 1;
        state.stop_requested = true;
        self.changed.notify_all();
        Ok(())
    }
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("platform", &self.platform)
            .field("failure", &self.failure)
            .finish_non_exhaustive()
    }
}
