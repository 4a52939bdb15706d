//! # playsync Common Library
//!
//! Shared code for the playsync crates:
//! - Error type
//! - Configuration file resolution and TOML loading
//! - Tracing subscriber setup
//! - Monotonic and wall-clock time helpers

pub mod config;
pub mod error;
pub mod logging;
pub mod time;

pub use error::{Error, Result};
