//! Player configuration
//!
//! Loaded from TOML (see `playsync_common::config` for file resolution).
//! Every field has a built-in default, so an empty or missing file yields a
//! working configuration.
//!
//! ```toml
//! sync_mode = "audio_master"
//! framedrop = "auto"
//! min_frames = 25
//! max_frame_duration_ms = 10000
//!
//! [logging]
//! level = "info"
//!
//! [simulation]
//! duration_ms = 3000
//! seek_at_ms = 1500
//! ```

use crate::error::{Error, Result};
use crate::media::stream::MIN_FRAMES;
use crate::media::sync::{FrameDropPolicy, SyncMode, DEFAULT_MAX_FRAME_DURATION};
use crate::media::types::{ClockMs, Size};
use playsync_common::config::{load_or_default, LoggingConfig, CONFIG_ENV_VAR};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Top-level player configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PlayerConfig {
    #[serde(default)]
    pub sync_mode: SyncMode,

    #[serde(default)]
    pub framedrop: FrameDropPolicy,

    /// Packets a stream buffers before the demuxer pauses
    #[serde(default = "default_min_frames")]
    pub min_frames: usize,

    /// Frame durations above this are treated as timestamp discontinuities
    #[serde(default = "default_max_frame_duration_ms")]
    pub max_frame_duration_ms: ClockMs,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub simulation: SimSettings,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sync_mode: SyncMode::default(),
            framedrop: FrameDropPolicy::default(),
            min_frames: default_min_frames(),
            max_frame_duration_ms: default_max_frame_duration_ms(),
            logging: LoggingConfig::default(),
            simulation: SimSettings::default(),
        }
    }
}

/// Synthetic source used by the pipeline simulation
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimSettings {
    /// Wall-clock run time
    pub duration_ms: u64,

    /// Produce an audio stream (audio master sync needs one)
    pub with_audio: bool,

    /// Video frames per second
    pub video_fps: u32,

    pub video_size: Size,

    /// Compressed bytes per video packet
    pub video_packet_bytes: usize,

    /// Duration of one audio packet
    pub audio_packet_ms: u64,

    pub audio_sample_rate: u32,
    pub audio_channels: u16,

    /// Wall-clock time at which the demuxer seeks, none to never seek
    pub seek_at_ms: Option<u64>,

    /// Media position the seek jumps to
    pub seek_target_ms: ClockMs,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            duration_ms: 3_000,
            with_audio: true,
            video_fps: 25,
            video_size: Size::new(1280, 720),
            video_packet_bytes: 4_096,
            audio_packet_ms: 20,
            audio_sample_rate: 48_000,
            audio_channels: 2,
            seek_at_ms: None,
            seek_target_ms: 60_000,
        }
    }
}

fn default_min_frames() -> usize {
    MIN_FRAMES
}

fn default_max_frame_duration_ms() -> ClockMs {
    DEFAULT_MAX_FRAME_DURATION
}

impl PlayerConfig {
    /// Load from the resolved config file, or defaults if there is none
    ///
    /// # Arguments
    /// * `cli_path` - Config path given on the command line, highest priority
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let config: PlayerConfig = load_or_default(cli_path, CONFIG_ENV_VAR)?;
        config.validate()?;
        info!(
            sync_mode = %config.sync_mode,
            min_frames = config.min_frames,
            "Player configuration loaded"
        );
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.min_frames == 0 {
            return Err(Error::Config("min_frames must be at least 1".to_string()));
        }
        if self.max_frame_duration_ms <= 0 {
            return Err(Error::Config(format!(
                "max_frame_duration_ms must be positive, got {}",
                self.max_frame_duration_ms
            )));
        }
        self.simulation.validate()
    }
}

impl SimSettings {
    pub fn validate(&self) -> Result<()> {
        if self.duration_ms == 0 {
            return Err(Error::Config("duration_ms must be positive".to_string()));
        }
        if self.video_fps == 0 || self.video_fps > 240 {
            return Err(Error::Config(format!(
                "video_fps must be in 1..=240, got {}",
                self.video_fps
            )));
        }
        if self.audio_packet_ms == 0 {
            return Err(Error::Config("audio_packet_ms must be positive".to_string()));
        }
        if self.with_audio && (self.audio_sample_rate == 0 || self.audio_channels == 0) {
            return Err(Error::Config(
                "audio_sample_rate and audio_channels must be positive".to_string(),
            ));
        }
        if let Some(seek_at) = self.seek_at_ms {
            if seek_at >= self.duration_ms {
                return Err(Error::Config(format!(
                    "seek_at_ms ({}) must fall inside duration_ms ({})",
                    seek_at, self.duration_ms
                )));
            }
        }
        Ok(())
    }

    /// Nominal video frame duration
    pub fn frame_duration_ms(&self) -> ClockMs {
        1000 / self.video_fps.max(1) as ClockMs
    }
}
