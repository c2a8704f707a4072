//! Common types shared across the credential manager workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
