//! Error types for playsync-core
//!
//! Queue and buffer operations report their outcomes through return values;
//! this type covers configuration, thread management and the simulation.

use thiserror::Error;

/// Main error type for playsync-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration values out of range
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors from the shared library (config file, logging setup)
    #[error(transparent)]
    Common(#[from] playsync_common::Error),

    /// Worker thread could not be spawned or panicked
    #[error("Thread error: {0}")]
    Thread(String),
}

/// Convenience Result type using playsync-core Error
pub type Result<T> = std::result::Result<T, Error>;
