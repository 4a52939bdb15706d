//! A/V Synchronization
//!
//! Picks the master clock, stretches or shrinks the nominal frame delay so
//! the video clock converges on the master, and decides on the render side
//! when a frame is shown, held or dropped.
//!
//! **Thresholds (milliseconds):**
//! - Sync correction is applied only when the drift exceeds a threshold
//!   clamped to [40, 100] by the frame delay
//! - Frames longer than 100 ms are lengthened by the drift instead of doubled
//! - Drifts beyond `max_frame_duration` are treated as discontinuities

use super::frame::{FrameSlot, VideoFrame, VideoFrameQueue};
use super::stats::Stats;
use super::stream::Stream;
use super::types::{ClockMs, Serial};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::trace;

/// Minimum drift before the frame delay is corrected
pub const AV_SYNC_THRESHOLD_MIN: ClockMs = 40;

/// Maximum correction threshold, also the frame timer catch-up limit
pub const AV_SYNC_THRESHOLD_MAX: ClockMs = 100;

/// Frames longer than this are not duplicated to catch up
pub const AV_SYNC_FRAMEDUP_THRESHOLD: ClockMs = 100;

/// Drift beyond which no early drop is attempted
pub const AV_NOSYNC_THRESHOLD: ClockMs = 10_000;

/// Frame duration cap for sources with timestamp discontinuities
pub const DEFAULT_MAX_FRAME_DURATION: ClockMs = 10_000;

/// Clock that the other streams follow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    AudioMaster,
    VideoMaster,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::AudioMaster => write!(f, "audio"),
            SyncMode::VideoMaster => write!(f, "video"),
        }
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "audio" | "audio_master" => Ok(SyncMode::AudioMaster),
            "video" | "video_master" => Ok(SyncMode::VideoMaster),
            other => Err(format!("unknown sync mode: {}", other)),
        }
    }
}

/// When late video frames may be dropped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameDropPolicy {
    /// Drop only while video is a slave clock
    #[default]
    Auto,
    On,
    Off,
}

impl FrameDropPolicy {
    /// Whether dropping is allowed under `mode`
    pub fn allows_drop(self, mode: SyncMode) -> bool {
        match self {
            FrameDropPolicy::On => true,
            FrameDropPolicy::Off => false,
            FrameDropPolicy::Auto => mode != SyncMode::VideoMaster,
        }
    }
}

impl FromStr for FrameDropPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(FrameDropPolicy::Auto),
            "on" => Ok(FrameDropPolicy::On),
            "off" => Ok(FrameDropPolicy::Off),
            other => Err(format!("unknown framedrop policy: {}", other)),
        }
    }
}

/// Sync mode actually in effect: audio master needs an audio stream
pub fn effective_sync_mode(mode: SyncMode, has_audio: bool) -> SyncMode {
    if mode == SyncMode::AudioMaster && !has_audio {
        SyncMode::VideoMaster
    } else {
        mode
    }
}

/// Current value of the master clock
pub fn master_clock(mode: SyncMode, audio: Option<&Stream>, video: &Stream) -> Option<ClockMs> {
    match (effective_sync_mode(mode, audio.is_some()), audio) {
        (SyncMode::AudioMaster, Some(audio)) => audio.get_clock(),
        _ => video.get_clock(),
    }
}

/// Adjust the nominal delay before the next frame to follow the master
///
/// # Arguments
/// * `delay` - Nominal duration of the frame being shown
/// * `video_clock` / `master_clock` - Current clock readings
/// * `mode` - Sync mode in effect; a video master is never corrected
/// * `max_frame_duration` - Drifts at or above this are ignored
pub fn compute_target_delay(
    delay: ClockMs,
    video_clock: Option<ClockMs>,
    master_clock: Option<ClockMs>,
    mode: SyncMode,
    max_frame_duration: ClockMs,
) -> ClockMs {
    if mode == SyncMode::VideoMaster {
        return delay;
    }

    let diff = match (video_clock, master_clock) {
        (Some(video), Some(master)) => video - master,
        _ => return delay,
    };

    let sync_threshold = delay.clamp(AV_SYNC_THRESHOLD_MIN, AV_SYNC_THRESHOLD_MAX);
    let target = if diff.abs() >= max_frame_duration {
        delay
    } else if diff <= -sync_threshold {
        (delay + diff).max(0)
    } else if diff >= sync_threshold && delay > AV_SYNC_FRAMEDUP_THRESHOLD {
        delay + diff
    } else if diff >= sync_threshold {
        2 * delay
    } else {
        delay
    };

    trace!(delay = target, a_v = -diff, "video delay");
    target
}

/// Display duration of `current` given the frame that follows it
///
/// Uses the pts difference when both frames share a serial and the
/// difference is plausible, otherwise the frame's nominal duration.
/// Frames from different generations have no duration.
pub fn frame_duration(
    current: &VideoFrame,
    next: &VideoFrame,
    max_frame_duration: ClockMs,
) -> ClockMs {
    if current.serial != next.serial {
        return 0;
    }
    match (current.pts, next.pts) {
        (Some(pts), Some(next_pts)) => {
            let duration = next_pts - pts;
            if duration <= 0 || duration > max_frame_duration {
                current.duration
            } else {
                duration
            }
        }
        _ => current.duration,
    }
}

/// Decoder-side early drop: the frame is already behind the master clock
///
/// Only frames of the clock's own generation are dropped, and only while
/// more packets are queued to replace them.
pub fn should_drop_early(
    frame_pts: Option<ClockMs>,
    master_clock: Option<ClockMs>,
    policy: FrameDropPolicy,
    mode: SyncMode,
    packet_serial: Serial,
    clock_serial: Option<Serial>,
    queued_packets: usize,
) -> bool {
    if !policy.allows_drop(mode) || queued_packets == 0 {
        return false;
    }
    if clock_serial != Some(packet_serial) {
        return false;
    }
    match (frame_pts, master_clock) {
        (Some(pts), Some(master)) => {
            let diff = pts - master;
            diff.abs() < AV_NOSYNC_THRESHOLD && diff < 0
        }
        _ => false,
    }
}

/// Result of one presenter step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshAction {
    /// Nothing to show
    Idle,

    /// Come back after this many milliseconds
    Wait(ClockMs),

    /// A new frame became current; it is available via `peek_last()`
    Display { pts: Option<ClockMs>, serial: Serial },
}

#[derive(Debug, Clone, Copy)]
struct FrameTiming {
    pts: Option<ClockMs>,
    duration: ClockMs,
    serial: Serial,
}

impl FrameTiming {
    fn of(frame: &VideoFrame) -> Self {
        Self {
            pts: frame.pts,
            duration: frame.duration,
            serial: frame.serial(),
        }
    }

    fn as_frame(&self) -> VideoFrame {
        VideoFrame {
            pts: self.pts,
            duration: self.duration,
            serial: self.serial,
            ..Default::default()
        }
    }
}

/// Render-side frame timing for a keep-last video frame queue
#[derive(Debug, Clone)]
pub struct VideoPresenter {
    sync_mode: SyncMode,
    framedrop: FrameDropPolicy,
    max_frame_duration: ClockMs,

    /// Monotonic ms at which the current frame was due, `None` before the first frame
    frame_timer: Option<ClockMs>,
}

impl VideoPresenter {
    pub fn new(
        sync_mode: SyncMode,
        framedrop: FrameDropPolicy,
        max_frame_duration: ClockMs,
    ) -> Self {
        Self {
            sync_mode,
            framedrop,
            max_frame_duration,
            frame_timer: None,
        }
    }

    pub fn frame_timer(&self) -> Option<ClockMs> {
        self.frame_timer
    }

    /// Advance the video queue at monotonic time `now`
    ///
    /// Stale-serial frames are skipped, late frames are dropped when the
    /// policy allows, and the video clock is anchored at the pts of the
    /// frame that becomes current.
    pub fn refresh(
        &mut self,
        frames: &VideoFrameQueue,
        video: &Stream,
        audio: Option<&Stream>,
        stats: &mut Stats,
        paused: bool,
        now: ClockMs,
    ) -> RefreshAction {
        let mode = effective_sync_mode(self.sync_mode, audio.is_some());

        loop {
            let current = match frames.peek() {
                Some(frame) => FrameTiming::of(&frame),
                None => return RefreshAction::Idle,
            };

            if current.serial != video.queue().serial() {
                trace!(serial = current.serial, "Skipping stale video frame");
                stats.frames_stale += 1;
                frames.pop();
                continue;
            }

            let last = match frames.peek_last() {
                Some(frame) => FrameTiming::of(&frame),
                None => current,
            };

            if last.serial != current.serial {
                self.frame_timer = Some(now);
            }

            if paused {
                return RefreshAction::Idle;
            }

            let last_duration = frame_duration(
                &last.as_frame(),
                &current.as_frame(),
                self.max_frame_duration,
            );
            let delay = compute_target_delay(
                last_duration,
                video.get_clock_at(now),
                master_clock_at(mode, audio, video, now),
                mode,
                self.max_frame_duration,
            );

            // The first frame is due immediately
            let timer = self.frame_timer.unwrap_or(now - delay);
            if now < timer + delay {
                return RefreshAction::Wait(timer + delay - now);
            }

            let mut timer = timer + delay;
            if delay > 0 && now - timer > AV_SYNC_THRESHOLD_MAX {
                timer = now;
            }
            self.frame_timer = Some(timer);

            if let Some(pts) = current.pts {
                video.set_clock_at(pts, current.serial, now);
            }

            let next = frames.peek_next().map(|frame| FrameTiming::of(&frame));
            if let Some(next) = next {
                let duration = frame_duration(
                    &current.as_frame(),
                    &next.as_frame(),
                    self.max_frame_duration,
                );
                if self.framedrop.allows_drop(mode) && now > timer + duration {
                    stats.frame_drops_late += 1;
                    frames.pop();
                    continue;
                }
            }

            frames.pop();
            stats.frame_processed += 1;
            return RefreshAction::Display {
                pts: current.pts,
                serial: current.serial,
            };
        }
    }
}

fn master_clock_at(
    mode: SyncMode,
    audio: Option<&Stream>,
    video: &Stream,
    now: ClockMs,
) -> Option<ClockMs> {
    match (mode, audio) {
        (SyncMode::AudioMaster, Some(audio)) => audio.get_clock_at(now),
        _ => video.get_clock_at(now),
    }
}
