//! Application layer: the OS-independent half of the engine.
//!
//! Nothing here calls an OS API.  Backends are reached only through the
//! [`backend::PlatformBackend`] trait, so the whole layer runs under test with
//! a scripted backend.
//!
//! # Sub-modules
//!
//! - **`backend`**: the trait every OS hook implements, its error type, and
//!   the [`backend::EventSink`] backends push raw occurrences into.
//! - **`lifecycle`**: [`lifecycle::HookEngine`], which starts and stops a
//!   session and reports its state.
//! - **`dispatch`**: the queue between the hook thread and the consumer
//!   thread, and the consumer thread itself.
//! - **`listeners`**: per-event-type routing on top of the handler trait.
//! - **`logger`**: the diagnostic sink shared by all of the above.

pub mod backend;
pub mod dispatch;
pub mod lifecycle;
pub mod listeners;
pub mod logger;
