//! Common error types for playsync

use thiserror::Error;

/// Common result type for playsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the playsync crates
#[derive(Error, Debug)]
pub enum Error {
    /// TOML parse error (wraps toml::de::Error)
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Logging subsystem could not be initialized
    #[error("Logging error: {0}")]
    Logging(String),
}
