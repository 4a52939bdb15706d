//! Bandwidth Targets
//!
//! Expected network throughput per stream, in bytes per second. A stream
//! that declares a bit rate gets a range around it; otherwise the range is
//! looked up from codec parameters.
//!
//! Tables are expressed in kilobits per second and converted with
//! `kbits_to_bytes` (1 kbit = 1024 bits).

use super::types::{Bandwidth, Size};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// H.264 Main profile id; lower ids are Baseline variants
pub const PROFILE_H264_MAIN: i32 = 77;

/// H.264 High profile id
pub const PROFILE_H264_HIGH: i32 = 100;

/// Frame rates above this use the high-frame-rate tables
const HIGH_FRAME_RATE: f64 = 30.0;

/// Convert kilobits per second to bytes per second
pub const fn kbits_to_bytes(kbps: u64) -> Bandwidth {
    kbps * 1024 / 8
}

/// Bytes per second over `interval_ms`, 0 for an empty interval
pub fn calculate_bandwidth(total_bytes: u64, interval_ms: i64) -> Bandwidth {
    if interval_ms <= 0 {
        return 0;
    }
    total_bytes * 1000 / interval_ms as u64
}

/// Acceptable throughput range for a stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesireBytesPerSec {
    pub min: Bandwidth,
    pub max: Bandwidth,
}

impl DesireBytesPerSec {
    pub const fn new(min: Bandwidth, max: Bandwidth) -> Self {
        Self { min, max }
    }

    const fn from_kbps(min: u64, max: u64) -> Self {
        Self::new(kbits_to_bytes(min), kbits_to_bytes(max))
    }

    /// A range is valid when it is non-empty and ordered
    pub fn is_valid(&self) -> bool {
        if self.min == 0 && self.max == 0 {
            return false;
        }
        self.min <= self.max
    }

    pub fn in_range(&self, value: Bandwidth) -> bool {
        self.is_valid() && self.min <= value && value <= self.max
    }
}

impl AddAssign for DesireBytesPerSec {
    fn add_assign(&mut self, other: Self) {
        self.min += other.min;
        self.max += other.max;
    }
}

impl Add for DesireBytesPerSec {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

/// Uncompressed audio: one kbit per thousand samples per second per channel
pub fn desire_raw_audio(sample_rate: u32, channels: u16) -> DesireBytesPerSec {
    let min_kbps = sample_rate as u64 * channels as u64 / 1000;
    DesireBytesPerSec::from_kbps(min_kbps, min_kbps * 2)
}

/// AAC by channel layout; unknown layouts yield an invalid range
pub fn desire_aac(channels: u16) -> DesireBytesPerSec {
    match channels {
        1 => DesireBytesPerSec::from_kbps(64, 128),
        2 => DesireBytesPerSec::from_kbps(128, 256),
        4 => DesireBytesPerSec::from_kbps(256, 384),
        6 => DesireBytesPerSec::from_kbps(384, 512),
        _ => DesireBytesPerSec::default(),
    }
}

/// Average bit rate declared by the container (bytes per second)
pub fn bitrate_average(bytes_per_sec: Bandwidth) -> DesireBytesPerSec {
    DesireBytesPerSec::new(bytes_per_sec, bytes_per_sec * 2)
}

/// (min width, min height, min kbps, max kbps), largest first
type ResolutionTable = [(u32, u32, u64, u64); 7];

const H264_BASELINE_SD_RATE: ResolutionTable = [
    (3840, 2160, 30000, 50000),
    (2560, 1440, 12000, 20000),
    (1920, 1080, 6000, 10000),
    (1280, 720, 3000, 7000),
    (854, 480, 2000, 3000),
    (640, 360, 650, 1200),
    (426, 240, 450, 800),
];

const H264_BASELINE_HIGH_RATE: ResolutionTable = [
    (3840, 2160, 45000, 75000),
    (2560, 1440, 18000, 30000),
    (1920, 1080, 9000, 15000),
    (1280, 720, 6000, 9000),
    (854, 480, 3000, 5000),
    (640, 360, 1200, 1800),
    (426, 240, 700, 1100),
];

const H264_HIGH_SD_RATE: ResolutionTable = [
    (3840, 2160, 44000, 56000),
    (2560, 1440, 15000, 25000),
    (1920, 1080, 8000, 12000),
    (1280, 720, 5000, 8000),
    (854, 480, 3300, 5700),
    (640, 360, 1900, 3500),
    (426, 240, 1000, 2000),
];

const H264_HIGH_HIGH_RATE: ResolutionTable = [
    (3840, 2160, 66000, 85000),
    (2560, 1440, 23000, 37000),
    (1920, 1080, 12000, 18000),
    (1280, 720, 7000, 12000),
    (854, 480, 5000, 7000),
    (640, 360, 2400, 3800),
    (426, 240, 1500, 2500),
];

/// H.264 by encoded frame size, frame rate and profile
///
/// Frames smaller than 426x240 and profiles above High yield an invalid range.
pub fn desire_h264(frame_size: Size, frame_rate: f64, profile: i32) -> DesireBytesPerSec {
    let high_rate = frame_rate > HIGH_FRAME_RATE;
    let table = if profile < PROFILE_H264_MAIN {
        if high_rate {
            &H264_BASELINE_HIGH_RATE
        } else {
            &H264_BASELINE_SD_RATE
        }
    } else if profile <= PROFILE_H264_HIGH {
        if high_rate {
            &H264_HIGH_HIGH_RATE
        } else {
            &H264_HIGH_SD_RATE
        }
    } else {
        return DesireBytesPerSec::default();
    };

    table
        .iter()
        .find(|(w, h, _, _)| frame_size.width >= *w && frame_size.height >= *h)
        .map(|&(_, _, min, max)| DesireBytesPerSec::from_kbps(min, max))
        .unwrap_or_default()
}

/// MPEG-2 by profile level frame size (max width, max height, kbps range)
const MPEG2_LEVELS: [(u32, u32, u64, u64); 4] = [
    (352, 288, 2000, 4000),
    (720, 576, 7500, 15000),
    (1440, 1152, 30000, 60000),
    (1920, 1152, 40000, 80000),
];

/// MPEG-2 by frame size; frames above High level yield an invalid range
pub fn desire_mpeg2(frame_size: Size) -> DesireBytesPerSec {
    MPEG2_LEVELS
        .iter()
        .find(|(w, h, _, _)| frame_size.width <= *w && frame_size.height <= *h)
        .map(|&(_, _, min, max)| DesireBytesPerSec::from_kbps(min, max))
        .unwrap_or_default()
}

/// Video codec families with a bandwidth table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    Mpeg2,
    Other,
}

/// Audio codec families with a bandwidth table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Aac,
    Pcm,
    Other,
}

/// Codec parameters a demuxer reports when a stream is opened
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CodecParams {
    Video {
        codec: VideoCodec,
        /// Declared bit rate in bits per second, 0 if unknown
        bit_rate: u64,
        size: Size,
        frame_rate: f64,
        profile: i32,
    },
    Audio {
        codec: AudioCodec,
        bit_rate: u64,
        sample_rate: u32,
        channels: u16,
    },
}

impl CodecParams {
    /// Desired bandwidth for a stream with these parameters
    ///
    /// A declared bit rate wins over the per-codec tables.
    pub fn desired_bandwidth(&self) -> DesireBytesPerSec {
        match *self {
            CodecParams::Video { bit_rate, .. } | CodecParams::Audio { bit_rate, .. }
                if bit_rate != 0 =>
            {
                bitrate_average(bit_rate / 8)
            }
            CodecParams::Video {
                codec: VideoCodec::H264,
                size,
                frame_rate,
                profile,
                ..
            } => desire_h264(size, frame_rate, profile),
            CodecParams::Video {
                codec: VideoCodec::Mpeg2,
                size,
                ..
            } => desire_mpeg2(size),
            CodecParams::Audio {
                codec: AudioCodec::Aac,
                channels,
                ..
            } => desire_aac(channels),
            CodecParams::Audio {
                codec: AudioCodec::Pcm,
                sample_rate,
                channels,
                ..
            } => desire_raw_audio(sample_rate, channels),
            _ => DesireBytesPerSec::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_bandwidth() {
        assert_eq!(calculate_bandwidth(5_000, 1_000), 5_000);
        assert_eq!(calculate_bandwidth(5_000, 500), 10_000);
        assert_eq!(calculate_bandwidth(5_000, 0), 0);
    }

    #[test]
    fn test_desire_validity_and_range() {
        assert!(!DesireBytesPerSec::default().is_valid());
        assert!(!DesireBytesPerSec::new(10, 5).is_valid());

        let band = DesireBytesPerSec::new(100, 200);
        assert!(band.in_range(100));
        assert!(band.in_range(200));
        assert!(!band.in_range(201));
        assert!(!DesireBytesPerSec::default().in_range(0));
    }

    #[test]
    fn test_desire_addition() {
        let total = desire_aac(2) + desire_h264(Size::new(1920, 1080), 25.0, 66);
        assert_eq!(total.min, kbits_to_bytes(128 + 6000));
        assert_eq!(total.max, kbits_to_bytes(256 + 10000));
    }

    #[test]
    fn test_raw_audio() {
        let band = desire_raw_audio(48_000, 2);
        assert_eq!(band, DesireBytesPerSec::new(kbits_to_bytes(96), kbits_to_bytes(192)));
    }

    #[test]
    fn test_aac_unknown_layout_is_invalid() {
        assert_eq!(desire_aac(1).min, 8192);
        assert!(!desire_aac(3).is_valid());
    }

    #[test]
    fn test_h264_tables() {
        let hd = Size::new(1280, 720);
        assert_eq!(desire_h264(hd, 30.0, 66), DesireBytesPerSec::from_kbps(3000, 7000));
        assert_eq!(desire_h264(hd, 60.0, 66), DesireBytesPerSec::from_kbps(6000, 9000));
        assert_eq!(desire_h264(hd, 25.0, 100), DesireBytesPerSec::from_kbps(5000, 8000));
        assert_eq!(desire_h264(hd, 50.0, 77), DesireBytesPerSec::from_kbps(7000, 12000));

        // Between rows: 1366x768 falls to the 720p row
        assert_eq!(
            desire_h264(Size::new(1366, 768), 25.0, 100),
            DesireBytesPerSec::from_kbps(5000, 8000)
        );

        assert!(!desire_h264(Size::new(320, 200), 25.0, 100).is_valid());
        assert!(!desire_h264(hd, 25.0, 244).is_valid());
    }

    #[test]
    fn test_mpeg2_levels() {
        assert_eq!(desire_mpeg2(Size::new(720, 576)), DesireBytesPerSec::from_kbps(7500, 15000));
        assert_eq!(desire_mpeg2(Size::new(1920, 1080)), DesireBytesPerSec::from_kbps(40000, 80000));
        assert!(!desire_mpeg2(Size::new(3840, 2160)).is_valid());
    }

    #[test]
    fn test_declared_bit_rate_wins() {
        let params = CodecParams::Video {
            codec: VideoCodec::H264,
            bit_rate: 8_000_000,
            size: Size::new(1920, 1080),
            frame_rate: 25.0,
            profile: 100,
        };
        assert_eq!(params.desired_bandwidth(), DesireBytesPerSec::new(1_000_000, 2_000_000));

        let params = CodecParams::Audio {
            codec: AudioCodec::Aac,
            bit_rate: 0,
            sample_rate: 48_000,
            channels: 2,
        };
        assert_eq!(params.desired_bandwidth(), desire_aac(2));
    }
}
