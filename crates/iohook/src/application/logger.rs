//! Diagnostic logger sink.
//!
//! Every part of the engine reports through one [`Logger`].  By default
//! records go to `tracing` under the `iohook` target; an embedder can install
//! its own callback with [`Logger::set_callback`] and route them anywhere.
//!
//! The callback returns `bool` to say whether it handled the record.  A
//! `false` return, or a panic inside the callback, is never fatal to the
//! engine.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Embedder-supplied log callback.
pub type LogCallback = dyn Fn(LogLevel, &str) -> bool + Send + Sync;

/// Cloneable handle; all clones share the callback and threshold.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

struct LoggerInner {
    min_level: LogLevel,
    callback: RwLock<Option<Arc<LogCallback>>>,
}

impl Logger {
    /// Creates a logger that drops records below `min_level`.
    pub fn new(min_level: LogLevel) -> Self {
        Logger {
            inner: Arc::new(LoggerInner {
                min_level,
                callback: RwLock::new(None),
            }),
        }
    }

    pub fn min_level(&self) -> LogLevel {
        self.inner.min_level
    }

    /// Replaces the sink. Takes effect for records logged after the call.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(LogLevel, &str) -> bool + Send + Sync + 'static,
    {
        let mut slot = self
            .inner
            .callback
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(callback));
    }

    /// Goes back to the `tracing` sink.
    pub fn clear_callback(&self) {
        let mut slot = self
            .inner
            .callback
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    /// Emits one record. Returns what the sink returned, or `false` when the
    /// record was filtered out or the sink panicked.
    pub fn log(&self, level: LogLevel, message: &str) -> bool {
        if level < self.inner.min_level {
            return false;
        }

        // Clone out of the lock so a slow callback never blocks set_callback.
        let callback = self
            .inner
            .callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match callback {
            Some(callback) => {
                panic::catch_unwind(AssertUnwindSafe(|| callback(level, message))).unwrap_or(false)
            }
            None => emit_tracing(level, message),
        }
    }

    pub fn debug(&self, message: &str) -> bool {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> bool {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> bool {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> bool {
        self.log(LogLevel::Error, message)
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("min_level", &self.inner.min_level)
            .finish_non_exhaustive()
    }
}

fn emit_tracing(level: LogLevel, message: &str) -> bool {
    match level {
        LogLevel::Debug => tracing::debug!(target: "iohook", "{message}"),
        LogLevel::Info => tracing::info!(target: "iohook", "{message}"),
        LogLevel::Warn => tracing::warn!(target: "iohook", "{message}"),
        LogLevel::Error => tracing::error!(target: "iohook", "{message}"),
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording_logger(min_level: LogLevel) -> (Logger, Arc<Mutex<Vec<(LogLevel, String)>>>) {
        let records = Arc::new(Mutex::new(Vec::new()));
        let logger = Logger::new(min_level);
        let sink = Arc::clone(&records);
        logger.set_callback(move |level, message| {
            sink.lock().unwrap().push((level, message.to_string()));
            true
        });
        (logger, records)
    }

    #[test]
    fn test_callback_receives_records_at_or_above_threshold() {
        // Arrange
        let (logger, records) = recording_logger(LogLevel::Warn);

        // Act
        let debug_handled = logger.debug("noise");
        let warn_handled = logger.warn("priority raise failed");
        logger.error("hook failed");

        // Assert
        assert!(!debug_handled);
        assert!(warn_handled);
        let records = records.lock().unwrap();
        assert_eq!(
            *records,
            vec![
                (LogLevel::Warn, "priority raise failed".to_string()),
                (LogLevel::Error, "hook failed".to_string()),
            ]
        );
    }

    #[test]
    fn test_false_return_is_passed_through() {
        let logger = Logger::new(LogLevel::Debug);
        logger.set_callback(|_, _| false);

        assert!(!logger.info("ignored by sink"));
    }

    #[test]
    fn test_panicking_callback_is_contained() {
        let logger = Logger::new(LogLevel::Debug);
        logger.set_callback(|_, _| panic!("sink exploded"));

        let handled = logger.error("boom");

        assert!(!handled);
    }

    #[test]
    fn test_clones_share_the_callback() {
        let (logger, records) = recording_logger(LogLevel::Debug);
        let clone = logger.clone();

        clone.info("from clone");

        assert_eq!(records.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_default_sink_is_tracing_and_reports_handled() {
        let logger = Logger::new(LogLevel::Debug);
        logger.clear_callback();

        assert!(logger.info("to tracing"));
    }

    #[test]
    fn test_levels_order_from_debug_to_error() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
    }
}
