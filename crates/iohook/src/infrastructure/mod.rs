//! Infrastructure layer: the OS-facing adapters.
//!
//! Contains the hook backends that implement
//! [`crate::application::backend::PlatformBackend`] for each target.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `iohook_core`, but MUST NOT be imported by the `application` layer.

pub mod backend;
