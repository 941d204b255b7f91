//! Per-type event routing.
//!
//! [`Listeners`] is an [`EventHandler`] that fans each delivered event out
//! to the callbacks registered for its [`EventType`], then to the catch-all
//! callbacks.  Handy when an embedder only cares about a few event kinds.

use std::collections::HashMap;

use iohook_core::{Event, EventType};

use super::dispatch::EventHandler;

type Callback = Box<dyn FnMut(&Event) + Send>;

#[derive(Default)]
pub struct Listeners {
    by_type: HashMap<EventType, Vec<Callback>>,
    any: Vec<Callback>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls `callback` for every event of `event_type`, in registration
    /// order.
    pub fn on<F>(mut self, event_type: EventType, callback: F) -> Self
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.by_type
            .entry(event_type)
            .or_default()
            .push(Box::new(callback));
        self
    }

    /// Calls `callback` for every event, after the typed callbacks.
    pub fn on_any<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.any.push(Box::new(callback));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.any.is_empty() && self.by_type.values().all(Vec::is_empty)
    }
}

impl EventHandler for Listeners {
    fn handle(&mut self, event: Event) {
        if let Some(callbacks) = self.by_type.get_mut(&event.event_type()) {
            for callback in callbacks {
                callback(&event);
            }
        }
        for callback in &mut self.any {
            callback(&event);
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("types", &self.by_type.keys().collect::<Vec<_>>())
            .field("any", &self.any.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iohook_core::{normalize, NativeEvent, NativeKey, NativeKind, Platform};
    use std::sync::{Arc, Mutex};

    fn key_down() -> Event {
        let key = NativeKey {
            code: 0x41,
            scan_code: 0x1E,
            extended: false,
        };
        normalize(&NativeEvent::new(Platform::Windows, 1, 0, NativeKind::KeyDown(key)))
    }

    fn motion() -> Event {
        normalize(&NativeEvent::new(
            Platform::Windows,
            2,
            0,
            NativeKind::Motion { x: 5, y: 5 },
        ))
    }

    #[test]
    fn test_typed_callbacks_only_see_their_type() {
        // Arrange
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut listeners = Listeners::new().on(EventType::KeyPressed, move |e| {
            sink.lock().unwrap().push(e.event_type())
        });

        // Act
        listeners.handle(motion());
        listeners.handle(key_down());

        // Assert
        assert_eq!(*seen.lock().unwrap(), vec![EventType::KeyPressed]);
    }

    #[test]
    fn test_catch_all_runs_after_typed_callbacks() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (Arc::clone(&order), Arc::clone(&order));
        let mut listeners = Listeners::new()
            .on_any(move |_| a.lock().unwrap().push("any"))
            .on(EventType::KeyPressed, move |_| b.lock().unwrap().push("typed"));

        listeners.handle(key_down());

        assert_eq!(*order.lock().unwrap(), vec!["typed", "any"]);
    }

    #[test]
    fn test_new_listeners_are_empty() {
        assert!(Listeners::new().is_empty());
        assert!(!Listeners::new().on_any(|_| {}).is_empty());
    }
}
