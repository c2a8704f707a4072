//! Credential lifecycle store
//!
//! The core of the credential manager: a single-owner, serialized actor that
//! keeps one OAuth credential fresh. Each named store runs as its own tokio
//! task; `get`/`put` and timer-driven refresh/validate transitions execute one
//! at a time, in the order received, so callers always observe whole-value
//! credential replacements and never a partial write.
//!
//! Lifecycle:
//! 1. `start()` loads the initial credential via [`LifecycleHooks::load`]
//! 2. Near-expiry (or expiry-less) credentials are refreshed before the store
//!    becomes usable; otherwise the credential is validated
//! 3. The running store refreshes ahead of expiry and revalidates on a fixed
//!    interval, persisting every replacement through [`LifecycleHooks::put`]
//! 4. `stop()` (or a fatal refresh failure) runs [`LifecycleHooks::terminate`]
//!    exactly once before the task resolves
//!
//! [`StoreRegistry`] lets multiple independently named stores coexist and be
//! looked up by name; handle-based access bypasses the registry entirely.

pub mod error;
pub mod hooks;
pub mod registry;
pub mod store;

pub use error::{Error, Result};
pub use hooks::{FileHooks, LifecycleHooks, NoopHooks};
pub use registry::StoreRegistry;
pub use store::{
    DEFAULT_REFRESH_MARGIN, DEFAULT_VALIDATE_INTERVAL, StartedStore, StoreHandle, StoreOptions,
    start,
};
