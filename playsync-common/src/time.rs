//! Timestamp utilities
//!
//! Playback timing uses a monotonic millisecond counter anchored at the first
//! call in the process. Wall-clock UTC timestamps are only used for reports.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::time::{Duration, Instant};

/// Process-wide anchor for the monotonic clock
static MONOTONIC_ANCHOR: Lazy<Instant> = Lazy::new(Instant::now);

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Monotonic milliseconds since the anchor was first touched.
///
/// Never goes backwards, unaffected by wall-clock adjustments.
pub fn now_ms() -> i64 {
    MONOTONIC_ANCHOR.elapsed().as_millis() as i64
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Convert a possibly negative millisecond delta to a duration, clamping at zero
pub fn clamp_millis_to_duration(millis: i64) -> Duration {
    Duration::from_millis(millis.max(0) as u64)
}
