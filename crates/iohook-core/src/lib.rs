//! # iohook-core
//!
//! The platform-independent half of iohook: the portable event model, the
//! key code tables and the normalizer that turns raw backend occurrences into
//! portable events.
//!
//! Nothing in this crate touches an OS API.  The engine crate (`iohook`)
//! owns the hooks and threads; it depends on this one for data.
//!
//! # How an event travels (overview)
//!
//! 1. A backend (Windows hook, X11 XRecord, macOS event tap) observes a key
//!    press and builds a [`NativeEvent`]: the platform's own key code and
//!    modifier word, tagged with the [`Platform`] they belong to.
//! 2. [`normalize`] maps it to an [`Event`]: a canonical [`KeyCode`], a
//!    [`ModifierMask`] with stable bits, and a payload that always matches
//!    the [`EventType`].
//! 3. The engine queues the event and delivers it to the embedder's callback
//!    on a separate thread.
//!
//! Modules:
//!
//! - **`event`**: [`Event`], its payloads and the modifier mask.
//! - **`keymap`**: Windows VK, X11 keysym and macOS keycode tables.
//! - **`native`**: the raw [`NativeEvent`] vocabulary backends speak.
//! - **`normalize`**: the pure mapping from native to portable.
//! - **`click`**: multi-click counting the backends share.

pub mod click;
pub mod event;
pub mod keymap;
pub mod native;
pub mod normalize;

pub use click::ClickTracker;
pub use event::{
    Event, EventError, EventPayload, EventType, KeyboardData, ModifierMask, MouseButton,
    MouseData, PayloadKind, ScrollType, WheelData, WheelDirection,
};
pub use keymap::{KeyCode, KeyMapper};
pub use native::{NativeButton, NativeEvent, NativeKey, NativeKind, NativeWheel, Platform, WheelAxis};
pub use normalize::normalize;
