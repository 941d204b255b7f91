//! # iohook
//!
//! Global keyboard and mouse hook engine.  An embedder hands a callback to
//! [`HookEngine::start`] and receives every input event the OS reports,
//! normalized into [`iohook_core::Event`], on a dedicated dispatch thread.
//!
//! ```no_run
//! use iohook::{default_backend, EngineConfig, HookEngine};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::default();
//! let backend = default_backend(&config.hook)?;
//! let engine = HookEngine::new(backend, config);
//! engine.start(|event: iohook::Event| println!("{:?}", event.event_type()))?;
//! // ...
//! engine.stop();
//! # Ok(())
//! # }
//! ```
//!
//! Layout:
//!
//! - **`application`**: lifecycle control, the dispatch bridge and the
//!   logger; OS-independent and fully testable with a scripted backend.
//! - **`infrastructure`**: the Windows, X11 and macOS hook backends.
//! - **`config`**: TOML-backed engine settings.

pub mod application;
pub mod config;
pub mod infrastructure;

pub use application::backend::{ErrorKind, EventSink, HookError, PlatformBackend};
pub use application::dispatch::{Drain, EventHandler, EventQueue};
pub use application::lifecycle::{EngineError, HookEngine, HookState, Status};
pub use application::listeners::Listeners;
pub use application::logger::{LogCallback, LogLevel, Logger};
pub use config::{load_config, ConfigError, EngineConfig};
pub use infrastructure::backend::{default_backend, mock::MockBackend};
pub use iohook_core::{Event, EventType, KeyCode, ModifierMask, MouseButton, NativeEvent, NativeKind};
