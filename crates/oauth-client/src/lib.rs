//! OAuth2 client library for the credential manager
//!
//! Provides the `Credential` value type, the remote auth operations
//! (refresh / validate / revoke) behind the [`AuthOps`] trait, and endpoint
//! configuration. This crate is a standalone library with no dependency on
//! the store actor — it can be tested and used independently.
//!
//! Token flow:
//! 1. A `Credential` is seeded with a refresh token (from config or a
//!    persisted record)
//! 2. `HttpAuthOps::refresh()` exchanges it at the token endpoint
//! 3. `Credential::apply_refresh()` merges the response into a new value
//! 4. `HttpAuthOps::validate()` periodically confirms the access token
//!    is still usable without changing it

pub mod config;
pub mod credential;
pub mod error;
pub mod ops;

pub use config::OAuthConfig;
pub use credential::{Credential, now_millis};
pub use error::{Error, Result};
pub use ops::{AuthOps, BoxFuture, Endpoints, HttpAuthOps, TokenResponse};
