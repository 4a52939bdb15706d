//! Playback statistics snapshot

use super::types::{Bandwidth, ClockMs};
use playsync_common::time::now_ms;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which elementary streams are active
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamFormat {
    #[default]
    Unknown,
    AudioOnly,
    VideoOnly,
    AudioVideo,
}

impl StreamFormat {
    pub fn from_streams(has_audio: bool, has_video: bool) -> Self {
        match (has_audio, has_video) {
            (true, true) => StreamFormat::AudioVideo,
            (true, false) => StreamFormat::AudioOnly,
            (false, true) => StreamFormat::VideoOnly,
            (false, false) => StreamFormat::Unknown,
        }
    }

    /// Three-character label shown in the on-screen statistics line
    pub fn label(&self) -> &'static str {
        match self {
            StreamFormat::Unknown => "   ",
            StreamFormat::AudioOnly => "M-A",
            StreamFormat::VideoOnly => "M-V",
            StreamFormat::AudioVideo => "A-V",
        }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Counters and clock readings collected by the render side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    /// Frames discarded by the decoder before queueing
    pub frame_drops_early: u64,

    /// Frames discarded by the presenter for being late
    pub frame_drops_late: u64,

    /// Frames displayed
    pub frame_processed: u64,

    /// Frames skipped because their serial was obsolete
    pub frames_stale: u64,

    pub master_clock: Option<ClockMs>,
    pub audio_clock: Option<ClockMs>,
    pub video_clock: Option<ClockMs>,
    pub fmt: StreamFormat,

    /// Queued packet bytes
    pub audio_queue_size: usize,
    pub video_queue_size: usize,

    pub audio_bandwidth: Bandwidth,
    pub video_bandwidth: Bandwidth,

    #[serde(skip)]
    start_ts: ClockMs,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            frame_drops_early: 0,
            frame_drops_late: 0,
            frame_processed: 0,
            frames_stale: 0,
            master_clock: None,
            audio_clock: None,
            video_clock: None,
            fmt: StreamFormat::Unknown,
            audio_queue_size: 0,
            video_queue_size: 0,
            audio_bandwidth: 0,
            video_bandwidth: 0,
            start_ts: now_ms(),
        }
    }

    /// Drift between the two clocks that matter for the stream format
    pub fn diff_streams(&self) -> Option<ClockMs> {
        let (a, b) = match self.fmt {
            StreamFormat::AudioVideo => (self.audio_clock, self.video_clock),
            StreamFormat::VideoOnly => (self.master_clock, self.video_clock),
            StreamFormat::AudioOnly => (self.master_clock, self.audio_clock),
            StreamFormat::Unknown => return Some(0),
        };
        Some(a? - b?)
    }

    pub fn total_frame_drops(&self) -> u64 {
        self.frame_drops_early + self.frame_drops_late
    }

    /// Displayed frames per second since the stats were created
    pub fn fps(&self) -> f64 {
        self.fps_at(now_ms())
    }

    pub fn fps_at(&self, now: ClockMs) -> f64 {
        let elapsed = now - self.start_ts;
        if elapsed <= 0 {
            return 0.0;
        }
        self.frame_processed as f64 * 1000.0 / elapsed as f64
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let diff = self
            .diff_streams()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{} {}ms fd={}/{} aq={}B vq={}B ab={}B/s vb={}B/s",
            self.fmt,
            diff,
            self.frame_drops_early,
            self.frame_drops_late,
            self.audio_queue_size,
            self.video_queue_size,
            self.audio_bandwidth,
            self.video_bandwidth
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_labels() {
        assert_eq!(StreamFormat::from_streams(true, true).label(), "A-V");
        assert_eq!(StreamFormat::from_streams(true, false).label(), "M-A");
        assert_eq!(StreamFormat::from_streams(false, true).label(), "M-V");
        assert_eq!(StreamFormat::from_streams(false, false).label(), "   ");
    }

    #[test]
    fn test_diff_streams_by_format() {
        let mut stats = Stats::new();
        stats.audio_clock = Some(1_000);
        stats.video_clock = Some(960);
        stats.master_clock = Some(1_000);

        stats.fmt = StreamFormat::AudioVideo;
        assert_eq!(stats.diff_streams(), Some(40));

        stats.fmt = StreamFormat::VideoOnly;
        assert_eq!(stats.diff_streams(), Some(40));

        stats.fmt = StreamFormat::AudioOnly;
        assert_eq!(stats.diff_streams(), Some(0));

        stats.video_clock = None;
        stats.fmt = StreamFormat::AudioVideo;
        assert_eq!(stats.diff_streams(), None);
    }

    #[test]
    fn test_fps() {
        let mut stats = Stats::new();
        stats.frame_processed = 50;
        let start = stats.start_ts;
        assert_eq!(stats.fps_at(start), 0.0);
        assert_eq!(stats.fps_at(start + 2_000), 25.0);
    }

    #[test]
    fn test_stats_serialize_to_json() {
        let mut stats = Stats::new();
        stats.fmt = StreamFormat::AudioVideo;
        stats.frame_drops_late = 3;

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["fmt"], "audio_video");
        assert_eq!(json["frame_drops_late"], 3);
        assert!(json.get("start_ts").is_none());
    }
}
