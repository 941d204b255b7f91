//! Dispatch bridge: hook thread → consumer thread.
//!
//! The OS calls the backend on a thread that must return quickly and must
//! never run embedder code.  Normalized events are therefore pushed into an
//! [`EventQueue`] there, and a separate consumer thread (the [`Dispatcher`])
//! pops them and calls the embedder's [`EventHandler`].
//!
//! # Guarantees
//!
//! - `enqueue` never blocks and never fails (the queue is unbounded).
//! - Events leave the queue in the order they entered it.
//! - `drain` takes what is queued at call time and nothing else; two
//!   drains in a row with no enqueue in between both come back empty.
//! - The handler only ever runs on the dispatcher thread.

use std::cell::Cell;
use std::io;
use std::iter::Take;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryIter};
use iohook_core::Event;

use super::logger::Logger;

// ── Event queue ──────────────────────────────────────────────────────────────

/// Unbounded FIFO shared by one producer and one consumer.
pub struct EventQueue {
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

/// Lazy sequence returned by [`EventQueue::drain`].
pub struct Drain<'a> {
    inner: Take<TryIter<'a, Event>>,
}

impl Iterator for Drain<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        EventQueue { tx, rx }
    }

    /// Appends `event`. Safe to call from the OS callback thread.
    pub fn enqueue(&self, event: Event) {
        // Sending only fails once every receiver is gone, and `self` owns one.
        let _ = self.tx.send(event);
    }

    /// Removes and yields the events queued at this moment, oldest first.
    ///
    /// Events enqueued while the sequence is being consumed are left for the
    /// next drain.
    pub fn drain(&self) -> Drain<'_> {
        let queued = self.rx.len();
        Drain {
            inner: self.rx.try_iter().take(queued),
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Blocking side used by the dispatcher to wait for work.
    pub(crate) fn receiver(&self) -> &Receiver<Event> {
        &self.rx
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ── Handler ──────────────────────────────────────────────────────────────────

/// Receives delivered events on the dispatcher thread.
///
/// Implemented for any `FnMut(Event) + Send` closure.
pub trait EventHandler: Send {
    fn handle(&mut self, event: Event);
}

impl<F> EventHandler for F
where
    F: FnMut(Event) + Send,
{
    fn handle(&mut self, event: Event) {
        self(event)
    }
}

// ── Dispatcher thread ────────────────────────────────────────────────────────

thread_local! {
    static ON_DISPATCH_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// `true` when called from inside an event handler.
pub(crate) fn on_dispatch_thread() -> bool {
    ON_DISPATCH_THREAD.with(Cell::get)
}

/// Owns the consumer thread for one session.
pub(crate) struct Dispatcher {
    shutdown: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawns the consumer thread.
    ///
    /// `keep_alive` is moved into the thread and dropped when it exits, so
    /// whatever it holds lives exactly as long as the thread.
    pub(crate) fn spawn<K>(
        thread_name: &str,
        queue: Arc<EventQueue>,
        handler: Box<dyn EventHandler>,
        logger: Logger,
        keep_alive: K,
    ) -> io::Result<Self>
    where
        K: Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let handle = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || {
                let _keep_alive = keep_alive;
                ON_DISPATCH_THREAD.with(|flag| flag.set(true));
                run(&queue, &shutdown_rx, handler, &logger);
                logger.debug("dispatcher thread exiting");
            })?;
        Ok(Dispatcher {
            shutdown: shutdown_tx,
            handle: Some(handle),
        })
    }

    /// Asks the thread to flush what is queued and exit, then joins it.
    ///
    /// Called from the dispatcher thread itself (an event handler stopping
    /// the engine) it only signals; the thread exits once the handler
    /// returns.
    pub(crate) fn shutdown(mut self) -> thread::Result<()> {
        let _ = self.shutdown.try_send(());
        match self.handle.take() {
            Some(handle) if handle.thread().id() != thread::current().id() => handle.join(),
            _ => Ok(()),
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let _ = self.shutdown.try_send(());
    }
}

enum Wake {
    Work(Event),
    Shutdown,
}

fn run(
    queue: &EventQueue,
    shutdown: &Receiver<()>,
    mut handler: Box<dyn EventHandler>,
    logger: &Logger,
) {
    loop {
        let wake = crossbeam_channel::select! {
            recv(queue.receiver()) -> event => match event {
                Ok(event) => Wake::Work(event),
                Err(_) => Wake::Shutdown,
            },
            recv(shutdown) -> _ => Wake::Shutdown,
        };

        if let Wake::Work(event) = &wake {
            deliver(handler.as_mut(), *event, logger);
        }
        for event in queue.drain() {
            deliver(handler.as_mut(), event, logger);
        }
        if let Wake::Shutdown = wake {
            break;
        }
    }
}

fn deliver(handler: &mut dyn EventHandler, event: Event, logger: &Logger) {
    let event_type = event.event_type();
    if panic::catch_unwind(AssertUnwindSafe(|| handler.handle(event))).is_err() {
        logger.error(&format!(
            "event handler panicked on {}; delivery continues",
            event_type.name()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::logger::LogLevel;
    use iohook_core::{EventPayload, EventType, ModifierMask, MouseButton, MouseData};
    use std::sync::Mutex;

    fn moved(x: i32) -> Event {
        Event::new(
            EventType::MouseMoved,
            ModifierMask::empty(),
            x as u64,
            EventPayload::Mouse(MouseData {
                button: MouseButton::NoButton,
                clicks: 0,
                x,
                y: 0,
            }),
        )
        .unwrap()
    }

    fn xs(events: impl Iterator<Item = Event>) -> Vec<i32> {
        events.map(|e| e.mouse().unwrap().x).collect()
    }

    #[test]
    fn test_drain_returns_enqueued_events_in_call_order() {
        // Arrange
        let queue = EventQueue::new();
        for x in 0..5 {
            queue.enqueue(moved(x));
        }

        // Act
        let drained = xs(queue.drain());

        // Assert
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_consecutive_drains_without_enqueue_are_empty() {
        let queue = EventQueue::new();
        queue.enqueue(moved(1));
        let _ = queue.drain().count();

        assert_eq!(queue.drain().count(), 0);
        assert_eq!(queue.drain().count(), 0);
    }

    #[test]
    fn test_order_is_preserved_across_drains() {
        let queue = EventQueue::new();
        queue.enqueue(moved(1));
        queue.enqueue(moved(2));
        let first = xs(queue.drain());
        queue.enqueue(moved(3));

        let second = xs(queue.drain());

        assert_eq!(first, vec![1, 2]);
        assert_eq!(second, vec![3]);
    }

    #[test]
    fn test_drain_leaves_events_enqueued_during_iteration() {
        // Arrange
        let queue = EventQueue::new();
        queue.enqueue(moved(1));

        // Act
        let mut drain = queue.drain();
        let first = drain.next();
        queue.enqueue(moved(2));
        let rest: Vec<_> = drain.collect();

        // Assert
        assert!(first.is_some());
        assert!(rest.is_empty());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_dispatcher_delivers_in_order_and_flushes_on_shutdown() {
        // Arrange
        let queue = Arc::new(EventQueue::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let dispatcher = Dispatcher::spawn(
            "test-dispatch",
            Arc::clone(&queue),
            Box::new(move |event: Event| sink.lock().unwrap().push(event.mouse().unwrap().x)),
            Logger::new(LogLevel::Error),
            (),
        )
        .unwrap();

        // Act
        for x in 0..100 {
            queue.enqueue(moved(x));
        }
        dispatcher.shutdown().unwrap();

        // Assert
        assert_eq!(*seen.lock().unwrap(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_handler_panic_does_not_stop_delivery() {
        let queue = Arc::new(EventQueue::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let dispatcher = Dispatcher::spawn(
            "test-dispatch",
            Arc::clone(&queue),
            Box::new(move |event: Event| {
                let x = event.mouse().unwrap().x;
                if x == 1 {
                    panic!("handler bug");
                }
                sink.lock().unwrap().push(x);
            }),
            Logger::new(LogLevel::Error),
            (),
        )
        .unwrap();

        queue.enqueue(moved(0));
        queue.enqueue(moved(1));
        queue.enqueue(moved(2));
        dispatcher.shutdown().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_keep_alive_is_released_when_the_thread_exits() {
        let token = Arc::new(());
        let dispatcher = Dispatcher::spawn(
            "test-dispatch",
            Arc::new(EventQueue::new()),
            Box::new(|_: Event| {}),
            Logger::new(LogLevel::Error),
            Arc::clone(&token),
        )
        .unwrap();

        dispatcher.shutdown().unwrap();

        assert_eq!(Arc::strong_count(&token), 1);
    }

    #[test]
    fn test_handler_runs_off_the_calling_thread() {
        let queue = Arc::new(EventQueue::new());
        let handler_flag = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&handler_flag);
        let dispatcher = Dispatcher::spawn(
            "test-dispatch",
            Arc::clone(&queue),
            Box::new(move |_: Event| *sink.lock().unwrap() = Some(on_dispatch_thread())),
            Logger::new(LogLevel::Error),
            (),
        )
        .unwrap();

        queue.enqueue(moved(0));
        dispatcher.shutdown().unwrap();

        assert_eq!(*handler_flag.lock().unwrap(), Some(true));
        assert!(!on_dispatch_thread());
    }
}
