//! Shared media core types: time units, serials, rationals, stream kinds

use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds on the playback timeline (pts) or the monotonic clock
pub type ClockMs = i64;

/// Queue generation number, bumped on every flush marker
pub type Serial = u64;

/// Bytes per second
pub type Bandwidth = u64;

/// Time base of a stream (`num / den` seconds per tick)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Millisecond time base (1/1000)
    pub const fn millis() -> Self {
        Self::new(1, 1000)
    }

    /// Rational as a float, 0.0 for a zero denominator
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }

    /// Convert a tick count in this time base to milliseconds
    pub fn ticks_to_ms(self, ticks: i64) -> ClockMs {
        (ticks as f64 * self.to_f64() * 1000.0).round() as ClockMs
    }

    /// Convert milliseconds to a tick count in this time base
    pub fn ms_to_ticks(self, ms: ClockMs) -> i64 {
        let seconds_per_tick = self.to_f64();
        if seconds_per_tick == 0.0 {
            return 0;
        }
        (ms as f64 / 1000.0 / seconds_per_tick).round() as i64
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Elementary stream kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Audio,
    Video,
    Subtitle,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Audio => write!(f, "audio"),
            StreamKind::Video => write!(f, "video"),
            StreamKind::Subtitle => write!(f, "subtitle"),
        }
    }
}

/// Frame size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width != 0 && self.height != 0
    }
}
