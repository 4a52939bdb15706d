//! # playsync Core Library (playsync-core)
//!
//! Media playback synchronization core: packet queues with generational
//! flush semantics, keep-last frame ring buffers, drift-corrected clocks and
//! the per-stream state tying them together.
//!
//! **Purpose:** Keep compressed packets, decoded frames and wall-clock time
//! consistent across independently scheduled demux, decode, audio and
//! render threads.
//!
//! **Architecture:** One thread per role, handoffs through Mutex + Condvar
//! queues. Seeking bumps the queue serial; consumers drop data whose serial
//! is no longer current.

pub mod config;
pub mod error;
pub mod media;
pub mod sim;

pub use config::PlayerConfig;
pub use error::{Error, Result};
pub use sim::{SimReport, Simulation};
