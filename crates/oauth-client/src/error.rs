//! Error types for OAuth operations

/// Errors from OAuth operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token refresh failed: {0}")]
    TokenExchange(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("credential has no refresh token")]
    MissingRefreshToken,

    #[error("credential has no access token")]
    MissingAccessToken,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("revocation failed: {0}")]
    Revocation(String),
}

/// Result alias for OAuth operations.
pub type Result<T> = std::result::Result<T, Error>;
