//! Error types for the credential store

/// Errors from store lifecycle and registry operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No credential could be obtained at startup; the store never started.
    #[error("store startup failed: {0}")]
    Startup(String),

    /// The refresh token was rejected or unreachable. Fatal: the store
    /// terminates, since a failed refresh cannot self-heal without new
    /// authorization.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// A live store is already registered under this name.
    #[error("store name already in use: {0}")]
    NameInUse(String),

    /// No store registered under this name.
    #[error("no store registered under name: {0}")]
    NotFound(String),

    /// The store has stopped; no further get/put will succeed.
    #[error("store is no longer running")]
    Closed,

    /// A lifecycle hook reported a failure.
    #[error("lifecycle hook failed: {0}")]
    Hook(String),
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;
