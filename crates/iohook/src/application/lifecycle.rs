//! Hook lifecycle controller.
//!
//! [`HookEngine`] owns one backend and at most one running session.  A
//! session is two threads:
//!
//! ```text
//!   hook thread                         dispatch thread
//!   backend.install_hook(sink)          handler(event) ...
//!     │ OS callback                          ▲
//!     └─► sink.dispatch(native) ─► EventQueue┘
//! ```
//!
//! `start` blocks until the hook thread reports either `HookEnabled` or an
//! exit, whichever comes first, so a successful `start` always means the OS
//! hook is live.  `stop` uninstalls, joins the hook thread, lets the
//! dispatcher flush what is queued, and joins it too.
//!
//! # State
//!
//! The observable [`HookState`] is an atomic so `status()` never blocks.
//! Transitions happen under the control mutex, which is what makes two
//! concurrent `start` calls yield exactly one session.  Event handlers may
//! call `start`/`stop` themselves: from the dispatch thread the mutex is only
//! tried, never waited on.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread::{self, JoinHandle};

use thiserror::Error;

use super::backend::{ErrorKind, EventSink, HookError, PlatformBackend};
use super::dispatch::{on_dispatch_thread, Dispatcher, EventHandler, EventQueue};
use super::logger::{LogLevel, Logger};
use crate::config::EngineConfig;

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("failed to spawn the {role} thread: {source}")]
    ThreadCreate {
        role: &'static str,
        #[source]
        source: io::Error,
    },
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Hook(e) => e.kind(),
            EngineError::ThreadCreate { .. } => ErrorKind::ThreadCreate,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            EngineError::Hook(e) => e.code(),
            EngineError::ThreadCreate { .. } => 0x10,
        }
    }
}

// ── State ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HookState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl HookState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => HookState::Starting,
            2 => HookState::Running,
            3 => HookState::Stopping,
            _ => HookState::Stopped,
        }
    }
}

/// Coarse status as reported to embedders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Stopped,
}

// ── Start latch ──────────────────────────────────────────────────────────────

enum StartOutcome {
    Pending,
    Enabled,
    Exited(Option<HookError>),
}

/// One-shot rendezvous between `start` and the hook thread. The first
/// signal wins; later ones are ignored.
pub(crate) struct StartLatch {
    outcome: Mutex<StartOutcome>,
    resolved: Condvar,
}

impl StartLatch {
    fn new() -> Self {
        StartLatch {
            outcome: Mutex::new(StartOutcome::Pending),
            resolved: Condvar::new(),
        }
    }

    pub(crate) fn signal_enabled(&self) -> bool {
        self.resolve(StartOutcome::Enabled)
    }

    fn signal_exited(&self, error: Option<HookError>) -> bool {
        self.resolve(StartOutcome::Exited(error))
    }

    fn resolve(&self, outcome: StartOutcome) -> bool {
        let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        if !matches!(*slot, StartOutcome::Pending) {
            return false;
        }
        *slot = outcome;
        self.resolved.notify_all();
        true
    }

    /// Blocks until resolved. `Err` carries the backend's error, if it gave
    /// one.
    fn wait(&self) -> Result<(), Option<HookError>> {
        let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        while matches!(*slot, StartOutcome::Pending) {
            slot = self
                .resolved
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
        match &mut *slot {
            StartOutcome::Exited(error) => Err(error.take()),
            _ => Ok(()),
        }
    }
}

// ── Session ──────────────────────────────────────────────────────────────────

/// Counts one live session resource for [`HookEngine::live_resources`].
pub(crate) struct ResourceLease {
    counter: Arc<AtomicUsize>,
}

impl ResourceLease {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        ResourceLease {
            counter: Arc::clone(counter),
        }
    }
}

impl Drop for ResourceLease {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// State shared between the engine, the backend's [`EventSink`] and the
/// hook thread for one session.
pub(crate) struct SessionShared {
    pub(crate) queue: Arc<EventQueue>,
    pub(crate) latch: StartLatch,
    pub(crate) logger: Logger,
    pub(crate) deliver_hook_events: bool,
    pub(crate) enabled: AtomicBool,
    pub(crate) paused: Arc<AtomicBool>,
    exited: AtomicBool,
    _lease: ResourceLease,
}

struct Session {
    shared: Arc<SessionShared>,
    hook_thread: Option<JoinHandle<()>>,
    dispatcher: Option<Dispatcher>,
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct HookEngine {
    backend: Arc<dyn PlatformBackend>,
    config: EngineConfig,
    logger: Logger,
    state: Arc<AtomicU8>,
    control: Mutex<Option<Session>>,
    paused: Arc<AtomicBool>,
    live_resources: Arc<AtomicUsize>,
}

impl HookEngine {
    pub fn new(backend: Arc<dyn PlatformBackend>, config: EngineConfig) -> Self {
        let logger = Logger::new(config.logging.level);
        HookEngine {
            backend,
            config,
            logger,
            state: Arc::new(AtomicU8::new(HookState::Stopped as u8)),
            control: Mutex::new(None),
            paused: Arc::new(AtomicBool::new(false)),
            live_resources: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn state(&self) -> HookState {
        HookState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// `Running` from the moment `start` succeeds until `stop` begins or the
    /// backend exits by itself.
    pub fn status(&self) -> Status {
        match self.state() {
            HookState::Running => Status::Running,
            _ => Status::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status() == Status::Running
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Routes engine diagnostics to `callback` instead of `tracing`.
    pub fn set_logger<F>(&self, callback: F)
    where
        F: Fn(LogLevel, &str) -> bool + Send + Sync + 'static,
    {
        self.logger.set_callback(callback);
    }

    /// Session objects (shared state, dispatcher thread) still alive. Zero
    /// whenever the engine is stopped and every thread has been joined.
    pub fn live_resources(&self) -> usize {
        self.live_resources.load(Ordering::SeqCst)
    }

    /// Installs the hook and starts delivering events to `handler`.
    ///
    /// Returns once the hook is live. Calling it while a session is running
    /// returns `Running` and leaves `handler` unused. A call that overlaps
    /// another thread's `start` waits for that one to resolve and returns
    /// the settled state without a second attempt: `Running`, or `Stopped`
    /// if the other start failed.
    ///
    /// From inside a handler the call cannot wait for a `start` or `stop`
    /// running on another thread. It returns the current state at once,
    /// which may be `Starting`, `Stopped` or `Stopping`, without starting
    /// anything.
    ///
    /// # Errors
    ///
    /// [`EngineError::ThreadCreate`] if a worker thread cannot be spawned,
    /// [`EngineError::Hook`] if the backend fails to install. Either way
    /// the engine is left `Stopped` with nothing running.
    pub fn start<H>(&self, handler: H) -> Result<HookState, EngineError>
    where
        H: EventHandler + 'static,
    {
        let arrived = self.state();
        if arrived == HookState::Running {
            return Ok(HookState::Running);
        }

        let Some(mut control) = self.lock_control() else {
            return Ok(self.state());
        };
        if arrived == HookState::Starting {
            // Another start held the lock until it resolved.
            return Ok(self.state());
        }
        if let Some(session) = control.as_ref() {
            if !session.shared.exited.load(Ordering::SeqCst) {
                return Ok(self.state());
            }
        }
        if let Some(stale) = control.take() {
            self.logger.debug("reaping a session whose backend already exited");
            self.teardown(stale);
        }

        self.set_state(HookState::Starting);
        self.paused.store(false, Ordering::SeqCst);
        match self.launch(Box::new(handler)) {
            Ok(session) => {
                let shared = Arc::clone(&session.shared);
                *control = Some(session);
                self.set_state(HookState::Running);
                // The backend may have given up between enabling and here.
                if shared.exited.load(Ordering::SeqCst) {
                    let _ = self.state.compare_exchange(
                        HookState::Running as u8,
                        HookState::Stopped as u8,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    );
                }
                self.logger
                    .info(&format!("{} hook running", self.backend.name()));
                Ok(HookState::Running)
            }
            Err(err) => {
                self.set_state(HookState::Stopped);
                self.logger.error(&format!(
                    "failed to start {} hook: {err} (code {:#04X})",
                    self.backend.name(),
                    err.code()
                ));
                Err(err)
            }
        }
    }

    /// Uninstalls the hook and waits for both threads. Events already queued
    /// are delivered before this returns. A no-op when nothing is running.
    ///
    /// Called from inside an event handler it returns before the dispatch
    /// thread has exited, since that thread is the caller.
    pub fn stop(&self) {
        let Some(mut control) = self.lock_control() else {
            return;
        };
        let Some(session) = control.take() else {
            return;
        };

        self.set_state(HookState::Stopping);
        self.teardown(session);
        self.set_state(HookState::Stopped);
        self.logger
            .info(&format!("{} hook stopped", self.backend.name()));
    }

    /// Stops delivering input events while keeping the hook installed.
    /// Events the OS reports in the meantime are dropped, not buffered.
    /// Safe to call from a handler; the next `start` clears it.
    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            self.logger.debug("event delivery paused");
        }
    }

    /// Undoes [`HookEngine::pause`].
    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            self.logger.debug("event delivery resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// `None` when called from the dispatch thread while another thread
    /// holds the lock; waiting there could deadlock against a `stop` that is
    /// flushing this very thread.
    fn lock_control(&self) -> Option<MutexGuard<'_, Option<Session>>> {
        if !on_dispatch_thread() {
            return Some(self.control.lock().unwrap_or_else(PoisonError::into_inner));
        }
        match self.control.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    fn set_state(&self, state: HookState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn launch(&self, handler: Box<dyn EventHandler>) -> Result<Session, EngineError> {
        let queue = Arc::new(EventQueue::new());
        let shared = Arc::new(SessionShared {
            queue: Arc::clone(&queue),
            latch: StartLatch::new(),
            logger: self.logger.clone(),
            deliver_hook_events: self.config.dispatch.deliver_hook_events,
            enabled: AtomicBool::new(false),
            paused: Arc::clone(&self.paused),
            exited: AtomicBool::new(false),
            _lease: ResourceLease::new(&self.live_resources),
        });

        let dispatcher = Dispatcher::spawn(
            &self.config.dispatch.thread_name,
            queue,
            handler,
            self.logger.clone(),
            ResourceLease::new(&self.live_resources),
        )
        .map_err(|source| EngineError::ThreadCreate {
            role: "dispatch",
            source,
        })?;

        let backend = Arc::clone(&self.backend);
        let state = Arc::clone(&self.state);
        let sink = EventSink::new(Arc::clone(&shared));
        let spawned = thread::Builder::new()
            .name(self.config.hook.thread_name.clone())
            .spawn(move || run_hook_thread(backend.as_ref(), sink, &state));
        let hook_thread = match spawned {
            Ok(handle) => handle,
            Err(source) => {
                self.join_dispatcher(dispatcher);
                return Err(EngineError::ThreadCreate {
                    role: "hook",
                    source,
                });
            }
        };

        match shared.latch.wait() {
            Ok(()) => Ok(Session {
                shared,
                hook_thread: Some(hook_thread),
                dispatcher: Some(dispatcher),
            }),
            Err(error) => {
                if hook_thread.join().is_err() {
                    self.logger.error("hook thread panicked during startup");
                }
                self.join_dispatcher(dispatcher);
                Err(EngineError::Hook(error.unwrap_or_else(|| {
                    HookError::Failure("backend returned before enabling the hook".to_string())
                })))
            }
        }
    }

    fn teardown(&self, mut session: Session) {
        let mut joinable = true;
        if !session.shared.exited.load(Ordering::SeqCst) {
            if let Err(err) = self.backend.uninstall_hook() {
                self.logger.error(&format!(
                    "failed to uninstall {} hook: {err}; leaving the hook thread detached",
                    self.backend.name()
                ));
                joinable = false;
            }
        }

        if let Some(handle) = session.hook_thread.take() {
            if joinable && handle.join().is_err() {
                self.logger.error("hook thread panicked");
            }
        }
        if let Some(dispatcher) = session.dispatcher.take() {
            self.join_dispatcher(dispatcher);
        }
    }

    fn join_dispatcher(&self, dispatcher: Dispatcher) {
        if dispatcher.shutdown().is_err() {
            self.logger.error("dispatch thread panicked");
        }
    }
}

impl Drop for HookEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for HookEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookEngine")
            .field("backend", &self.backend.name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Body of the hook thread.
fn run_hook_thread(backend: &dyn PlatformBackend, sink: EventSink, state: &AtomicU8) {
    let shared = sink.shared();
    let result = panic::catch_unwind(AssertUnwindSafe(|| backend.install_hook(sink)))
        .unwrap_or_else(|_| Err(HookError::Failure("hook backend panicked".to_string())));

    shared.exited.store(true, Ordering::SeqCst);
    if shared.latch.signal_exited(result.clone().err()) {
        // start() is still waiting and reports the error itself.
        return;
    }

    let ran_away = state
        .compare_exchange(
            HookState::Running as u8,
            HookState::Stopped as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        )
        .is_ok();
    match result {
        Err(err) => shared.logger.error(&format!(
            "{} hook exited with an error: {err} (code {:#04X})",
            backend.name(),
            err.code()
        )),
        Ok(()) if ran_away => shared
            .logger
            .warn(&format!("{} hook exited without being stopped", backend.name())),
        Ok(()) => shared.logger.debug("hook thread exiting"),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::backend::MockPlatformBackend;
    use iohook_core::{Event, NativeEvent, NativeKind, Platform};

    fn quiet_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.logging.level = LogLevel::Error;
        config
    }

    #[test]
    fn test_start_reports_backend_error_and_stays_stopped() {
        // Arrange
        let mut backend = MockPlatformBackend::new();
        backend.expect_name().return_const("mock");
        backend
            .expect_install_hook()
            .times(1)
            .returning(|_| Err(HookError::RecordNotFound));
        backend.expect_uninstall_hook().never();
        let engine = HookEngine::new(Arc::new(backend), quiet_config());

        // Act
        let result = engine.start(|_: Event| {});

        // Assert
        let err = result.unwrap_err();
        assert_eq!(err.code(), 0x21);
        assert_eq!(err.kind(), ErrorKind::ResourceAcquisition);
        assert_eq!(engine.status(), Status::Stopped);
        assert_eq!(engine.live_resources(), 0);
    }

    #[test]
    fn test_backend_returning_ok_without_enabling_is_a_failure() {
        let mut backend = MockPlatformBackend::new();
        backend.expect_name().return_const("mock");
        backend.expect_install_hook().returning(|_| Ok(()));
        let engine = HookEngine::new(Arc::new(backend), quiet_config());

        let err = engine.start(|_: Event| {}).unwrap_err();

        assert!(matches!(err, EngineError::Hook(HookError::Failure(_))));
        assert_eq!(engine.state(), HookState::Stopped);
    }

    #[test]
    fn test_backend_that_exits_after_enabling_reads_as_stopped() {
        // Arrange: enable, then return at once as if the OS dropped the hook.
        let mut backend = MockPlatformBackend::new();
        backend.expect_name().return_const("mock");
        backend.expect_install_hook().returning(|sink| {
            sink.dispatch(NativeEvent::new(Platform::Windows, 0, 0, NativeKind::HookEnabled));
            Ok(())
        });
        backend.expect_uninstall_hook().never();
        let engine = HookEngine::new(Arc::new(backend), quiet_config());

        // Act
        let started = engine.start(|_: Event| {});
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while engine.is_running() && std::time::Instant::now() < deadline {
            thread::yield_now();
        }
        engine.stop();

        // Assert
        assert!(started.is_ok());
        assert_eq!(engine.status(), Status::Stopped);
        assert_eq!(engine.live_resources(), 0);
    }

    #[test]
    fn test_thread_create_error_has_its_own_code() {
        let err = EngineError::ThreadCreate {
            role: "hook",
            source: io::Error::new(io::ErrorKind::Other, "no threads left"),
        };

        assert_eq!(err.code(), 0x10);
        assert_eq!(err.kind(), ErrorKind::ThreadCreate);
    }

    #[test]
    fn test_latch_keeps_the_first_outcome() {
        let latch = StartLatch::new();

        assert!(latch.signal_enabled());
        assert!(!latch.signal_exited(Some(HookError::OutOfMemory)));
        assert_eq!(latch.wait(), Ok(()));
    }
}
