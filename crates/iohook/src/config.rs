//! Engine configuration.
//!
//! Every field has a default, so an empty document (or no file at all) gives
//! a working engine.  Example:
//!
//! ```toml
//! [hook]
//! multi_click_interval_ms = 400
//!
//! [dispatch]
//! deliver_hook_events = true
//!
//! [logging]
//! level = "debug"
//! ```
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when absent, which also keeps older files loading after new
//! fields are added.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::logger::LogLevel;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Schema ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub hook: HookConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for the thread that services the OS hook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HookConfig {
    #[serde(default = "default_hook_thread_name")]
    pub thread_name: String,
    /// Fallback multi-click window when the OS does not report one.
    #[serde(default = "default_multi_click_interval_ms")]
    pub multi_click_interval_ms: u64,
    /// Fallback lines per wheel notch when the OS does not report one.
    #[serde(default = "default_wheel_lines")]
    pub wheel_lines: u16,
}

/// Settings for the consumer thread that runs the event handler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchConfig {
    #[serde(default = "default_dispatch_thread_name")]
    pub thread_name: String,
    /// Hand `HookEnabled`/`HookDisabled` to the handler as well.
    #[serde(default)]
    pub deliver_hook_events: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
}

// ── Default helpers ──────────────────────────────────────────────────────────

fn default_hook_thread_name() -> String {
    "iohook-hook".to_string()
}
fn default_dispatch_thread_name() -> String {
    "iohook-dispatch".to_string()
}
fn default_multi_click_interval_ms() -> u64 {
    iohook_core::click::DEFAULT_MULTI_CLICK_MS
}
fn default_wheel_lines() -> u16 {
    3
}
fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            thread_name: default_hook_thread_name(),
            multi_click_interval_ms: default_multi_click_interval_ms(),
            wheel_lines: default_wheel_lines(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            thread_name: default_dispatch_thread_name(),
            deliver_hook_events: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────────────────

impl EngineConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is malformed.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Loads the configuration at `path`, returning defaults when the file does
/// not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => EngineConfig::from_toml_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(EngineConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
