//! Drift-based playback clock
//!
//! A clock is anchored at a presentation timestamp and the monotonic time at
//! which that timestamp was current. Reading the clock extrapolates from the
//! anchor:
//!
//! ```text
//! pts_drift = pts - last_updated
//! clock     = pts_drift + now - (now - last_updated) * (1 - speed)
//! ```
//!
//! The clock remembers the packet-queue serial it was anchored with. Reads
//! pass the governing queue's live serial; a mismatch means the anchor
//! predates the last flush and the read reports `None` until re-anchored.

use super::types::{ClockMs, Serial};
use playsync_common::time::now_ms;

/// Normal playback speed
pub const DEFAULT_SPEED: f64 = 1.0;

/// Playback clock for one elementary stream
#[derive(Debug, Clone)]
pub struct Clock {
    /// Clock base
    pts: ClockMs,

    /// Clock base minus the time at which the clock was updated
    pts_drift: ClockMs,

    /// Monotonic time of the last anchor
    last_updated: ClockMs,

    /// Playback speed multiplier (1.0 = normal)
    speed: f64,

    /// Queue serial the anchor belongs to, `None` until first anchored
    serial: Option<Serial>,

    /// Frozen while paused
    paused: bool,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    /// Create an unanchored clock. Reads report `None` until `set_clock*`.
    pub fn new() -> Self {
        Self {
            pts: 0,
            pts_drift: 0,
            last_updated: 0,
            speed: DEFAULT_SPEED,
            serial: None,
            paused: false,
        }
    }

    /// Re-anchor the clock at `pts` observed at monotonic `time`
    pub fn set_clock_at(&mut self, pts: ClockMs, serial: Serial, time: ClockMs) {
        self.pts = pts;
        self.last_updated = time;
        self.pts_drift = pts - time;
        self.serial = Some(serial);
    }

    /// Re-anchor the clock at `pts` observed now
    pub fn set_clock(&mut self, pts: ClockMs, serial: Serial) {
        self.set_clock_at(pts, serial, now_ms());
    }

    /// Current clock value, `None` if obsolete relative to `queue_serial`
    pub fn get_clock(&self, queue_serial: Serial) -> Option<ClockMs> {
        self.get_clock_at(queue_serial, now_ms())
    }

    /// Clock value at monotonic time `now`
    pub fn get_clock_at(&self, queue_serial: Serial, now: ClockMs) -> Option<ClockMs> {
        if self.serial != Some(queue_serial) {
            return None;
        }

        if self.paused {
            return Some(self.pts);
        }

        let lag = (now - self.last_updated) as f64 * (1.0 - self.speed);
        Some(((self.pts_drift + now) as f64 - lag).round() as ClockMs)
    }

    /// Change playback speed without a jump in the clock value
    pub fn set_speed(&mut self, speed: f64, queue_serial: Serial) {
        let now = now_ms();
        if let (Some(value), Some(serial)) = (self.get_clock_at(queue_serial, now), self.serial) {
            self.set_clock_at(value, serial, now);
        }
        self.speed = speed;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pts(&self) -> ClockMs {
        self.pts
    }

    pub fn last_updated(&self) -> ClockMs {
        self.last_updated
    }

    pub fn serial(&self) -> Option<Serial> {
        self.serial
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unanchored_clock_is_invalid() {
        let clock = Clock::new();
        assert_eq!(clock.get_clock_at(0, 1000), None);
        assert_eq!(clock.serial(), None);
    }

    #[test]
    fn test_clock_extrapolates_from_anchor() {
        let mut clock = Clock::new();
        clock.set_clock_at(5_000, 1, 100);

        assert_eq!(clock.get_clock_at(1, 100), Some(5_000));
        assert_eq!(clock.get_clock_at(1, 350), Some(5_250));
    }

    #[test]
    fn test_clock_obsolete_after_serial_change() {
        let mut clock = Clock::new();
        clock.set_clock_at(1_000, 5, 0);
        assert_eq!(clock.get_clock_at(6, 10), None);

        clock.set_clock_at(2_000, 6, 10);
        assert_eq!(clock.get_clock_at(6, 30), Some(2_020));
    }

    #[test]
    fn test_paused_clock_returns_frozen_pts() {
        let mut clock = Clock::new();
        clock.set_clock_at(1_000, 1, 0);
        clock.set_paused(true);

        assert_eq!(clock.get_clock_at(1, 10_000), Some(1_000));
        assert!(clock.is_paused());

        clock.set_paused(false);
        assert_eq!(clock.get_clock_at(1, 500), Some(1_500));
    }

    #[test]
    fn test_half_speed_advances_half_as_fast() {
        let mut clock = Clock::new();
        clock.set_clock_at(0, 1, 1_000);
        clock.speed = 0.5;

        assert_eq!(clock.get_clock_at(1, 1_200), Some(100));
        assert_eq!(clock.get_clock_at(1, 3_000), Some(1_000));
    }

    #[test]
    fn test_set_speed_keeps_clock_continuous() {
        let mut clock = Clock::new();
        clock.set_clock(10_000, 3);
        let before = clock.get_clock(3).unwrap();

        clock.set_speed(2.0, 3);
        let after = clock.get_clock(3).unwrap();

        assert!((after - before).abs() < 50);
        assert_eq!(clock.speed(), 2.0);
        assert_eq!(clock.serial(), Some(3));
    }

    #[test]
    fn test_anchor_accessors() {
        let mut clock = Clock::new();
        clock.set_clock_at(700, 2, 300);
        assert_eq!(clock.pts(), 700);
        assert_eq!(clock.last_updated(), 300);
        assert_eq!(clock.serial(), Some(2));
    }
}
