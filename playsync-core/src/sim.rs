//! Pipeline Simulation
//!
//! Drives the media core end to end with a synthetic source, one thread per
//! role:
//!
//! - **demux**: generates interleaved audio/video packets, pauses while every
//!   stream has enough buffered, and optionally seeks once (flush + marker)
//! - **video-decode / audio-decode**: pull packets through a `PacketFeed`
//!   and publish frames into the frame ring buffers
//! - **audio-render**: plays audio frames in real time and drives the audio clock
//! - **video-render**: runs the `VideoPresenter` against the master clock
//!
//! Shutdown only uses the core's cancellation primitives: the stop flag,
//! `PacketQueue::abort()` and `RingBuffer::stop()`.

use crate::config::{PlayerConfig, SimSettings};
use crate::error::{Error, Result};
use crate::media::bandwidth::{AudioCodec, CodecParams, VideoCodec};
use crate::media::decoder::{FeedEvent, PacketFeed};
use crate::media::frame::{AudioFrameQueue, FrameSlot, VideoFrameQueue};
use crate::media::packet::Packet;
use crate::media::stats::{Stats, StreamFormat};
use crate::media::stream::Stream;
use crate::media::sync::{
    effective_sync_mode, master_clock, should_drop_early, FrameDropPolicy, RefreshAction, SyncMode,
    VideoPresenter,
};
use crate::media::types::{ClockMs, Rational, Serial, Size, StreamKind};
use chrono::{DateTime, Utc};
use playsync_common::time::{clamp_millis_to_duration, millis_to_duration, now, now_ms};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

/// Render loop period when there is nothing to do
const REFRESH_RATE_MS: ClockMs = 10;

/// Demuxer stops reading once this many bytes are queued in total
const MAX_QUEUE_SIZE: usize = 15 * 1024 * 1024;

/// H.264 High profile for the synthetic video stream
const SIM_VIDEO_PROFILE: i32 = 100;

const VIDEO_STREAM_INDEX: usize = 0;
const AUDIO_STREAM_INDEX: usize = 1;

/// Outcome of a simulation run
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sync_mode: SyncMode,
    pub framedrop: FrameDropPolicy,
    pub packets_demuxed: u64,
    pub video_frames_decoded: u64,
    pub audio_frames_decoded: u64,
    pub audio_frames_played: u64,
    pub audio_frames_stale: u64,

    /// Video queue serial after the seek, if one happened
    pub seek_serial: Option<Serial>,

    /// Pts of the first frame displayed from the post-seek generation
    pub first_pts_after_seek: Option<ClockMs>,

    /// Frames of an older generation displayed after a newer one
    pub stale_frames_displayed: u64,

    pub stats: Stats,
}

impl fmt::Display for SimReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = (self.finished_at - self.started_at).num_milliseconds();
        writeln!(
            f,
            "Simulation ran {} ms ({} master, framedrop {:?})",
            elapsed, self.sync_mode, self.framedrop
        )?;
        writeln!(f, "  packets demuxed:   {}", self.packets_demuxed)?;
        writeln!(
            f,
            "  video frames:      {} decoded, {} shown, {} early drops, {} late drops, {} stale",
            self.video_frames_decoded,
            self.stats.frame_processed,
            self.stats.frame_drops_early,
            self.stats.frame_drops_late,
            self.stats.frames_stale
        )?;
        writeln!(
            f,
            "  audio frames:      {} decoded, {} played, {} stale",
            self.audio_frames_decoded, self.audio_frames_played, self.audio_frames_stale
        )?;
        if let Some(serial) = self.seek_serial {
            writeln!(
                f,
                "  seek:              serial {}, first pts {:?}",
                serial, self.first_pts_after_seek
            )?;
        }
        write!(f, "  {}", self.stats)
    }
}

#[derive(Debug, Default)]
struct Counters {
    packets_demuxed: AtomicU64,
    video_decoded: AtomicU64,
    audio_decoded: AtomicU64,
    audio_played: AtomicU64,
    audio_stale: AtomicU64,
    stale_displayed: AtomicU64,
}

/// State shared by every pipeline thread
struct Shared {
    video: Arc<Stream>,
    audio: Option<Arc<Stream>>,
    video_frames: VideoFrameQueue,
    audio_frames: AudioFrameQueue,
    stats: Mutex<Stats>,
    stop_flag: AtomicBool,
    counters: Counters,
    seek_serial: Mutex<Option<Serial>>,
    first_pts_after_seek: Mutex<Option<ClockMs>>,
    sync_mode: SyncMode,
    framedrop: FrameDropPolicy,
    max_frame_duration: ClockMs,
}

impl Shared {
    fn stopped(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }

    fn streams(&self) -> impl Iterator<Item = &Arc<Stream>> {
        std::iter::once(&self.video).chain(self.audio.iter())
    }

    fn master_clock(&self) -> Option<ClockMs> {
        master_clock(self.sync_mode, self.audio.as_deref(), &self.video)
    }

    /// Backpressure: every stream has enough, or the byte cap is reached
    fn queues_full(&self) -> bool {
        let total: usize = self.streams().map(|s| s.queue().size()).sum();
        total > MAX_QUEUE_SIZE || self.streams().all(|s| s.has_enough_packets())
    }
}

/// End-to-end pipeline run over a synthetic source
pub struct Simulation {
    config: PlayerConfig,
}

impl Simulation {
    pub fn new(config: PlayerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Run for the configured duration and collect the report
    pub fn run(&self) -> Result<SimReport> {
        let settings = self.config.simulation.clone();
        let started_at = now();
        let shared = Arc::new(self.open_streams(&settings));

        info!(
            duration_ms = settings.duration_ms,
            audio = settings.with_audio,
            sync_mode = %shared.sync_mode,
            "Starting pipeline simulation"
        );

        for stream in shared.streams() {
            stream.queue().start();
        }

        let start = now_ms();
        let mut handles = Vec::new();
        let spawned = self.spawn_threads(&shared, &settings, start, &mut handles);

        if spawned.is_ok() {
            thread::sleep(millis_to_duration(settings.duration_ms));
        }

        Self::shutdown(&shared);
        let joined = Self::join_all(handles);
        spawned?;
        joined?;

        let report = Self::build_report(&shared, started_at);
        info!(
            displayed = report.stats.frame_processed,
            dropped = report.stats.total_frame_drops(),
            "Pipeline simulation finished"
        );
        Ok(report)
    }

    fn open_streams(&self, settings: &SimSettings) -> Shared {
        let video = Stream::new(StreamKind::Video, VIDEO_STREAM_INDEX, Rational::new(1, 90_000))
            .with_frame_rate(Rational::new(settings.video_fps as i32, 1))
            .with_min_frames(self.config.min_frames)
            .with_codec_params(&CodecParams::Video {
                codec: VideoCodec::H264,
                bit_rate: 0,
                size: settings.video_size,
                frame_rate: settings.video_fps as f64,
                profile: SIM_VIDEO_PROFILE,
            });

        let audio = settings.with_audio.then(|| {
            Arc::new(
                Stream::new(
                    StreamKind::Audio,
                    AUDIO_STREAM_INDEX,
                    Rational::new(1, settings.audio_sample_rate as i32),
                )
                .with_min_frames(self.config.min_frames)
                .with_codec_params(&CodecParams::Audio {
                    codec: AudioCodec::Aac,
                    bit_rate: 0,
                    sample_rate: settings.audio_sample_rate,
                    channels: settings.audio_channels,
                }),
            )
        });

        Shared {
            video: Arc::new(video),
            sync_mode: effective_sync_mode(self.config.sync_mode, audio.is_some()),
            audio,
            video_frames: VideoFrameQueue::new(true),
            audio_frames: AudioFrameQueue::new(true),
            stats: Mutex::new(Stats::new()),
            stop_flag: AtomicBool::new(false),
            counters: Counters::default(),
            seek_serial: Mutex::new(None),
            first_pts_after_seek: Mutex::new(None),
            framedrop: self.config.framedrop,
            max_frame_duration: self.config.max_frame_duration_ms,
        }
    }

    fn spawn_threads(
        &self,
        shared: &Arc<Shared>,
        settings: &SimSettings,
        start: ClockMs,
        handles: &mut Vec<JoinHandle<()>>,
    ) -> Result<()> {
        let s = Arc::clone(shared);
        let demux_settings = settings.clone();
        handles.push(spawn("demux", move || demux_loop(&s, &demux_settings, start))?);

        let s = Arc::clone(shared);
        let size = settings.video_size;
        handles.push(spawn("video-decode", move || video_decode_loop(&s, size))?);

        let s = Arc::clone(shared);
        handles.push(spawn("video-render", move || video_render_loop(&s))?);

        if shared.audio.is_some() {
            let s = Arc::clone(shared);
            let audio_settings = settings.clone();
            handles.push(spawn("audio-decode", move || audio_decode_loop(&s, &audio_settings))?);

            let s = Arc::clone(shared);
            handles.push(spawn("audio-render", move || audio_render_loop(&s))?);
        }

        Ok(())
    }

    fn shutdown(shared: &Shared) {
        debug!("Stopping pipeline threads");
        shared.stop_flag.store(true, Ordering::Relaxed);
        for stream in shared.streams() {
            stream.queue().abort();
        }
        shared.video_frames.stop();
        shared.audio_frames.stop();
    }

    fn join_all(handles: Vec<JoinHandle<()>>) -> Result<()> {
        let mut failed = Vec::new();
        for handle in handles {
            let name = handle.thread().name().unwrap_or("<unnamed>").to_string();
            match handle.join() {
                Ok(()) => debug!("Thread {} joined", name),
                Err(e) => {
                    error!("Thread {} panicked: {:?}", name, e);
                    failed.push(name);
                }
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(Error::Thread(format!("threads panicked: {}", failed.join(", "))))
        }
    }

    fn build_report(shared: &Shared, started_at: DateTime<Utc>) -> SimReport {
        update_stats(shared);
        let c = &shared.counters;
        SimReport {
            started_at,
            finished_at: now(),
            sync_mode: shared.sync_mode,
            framedrop: shared.framedrop,
            packets_demuxed: c.packets_demuxed.load(Ordering::Relaxed),
            video_frames_decoded: c.video_decoded.load(Ordering::Relaxed),
            audio_frames_decoded: c.audio_decoded.load(Ordering::Relaxed),
            audio_frames_played: c.audio_played.load(Ordering::Relaxed),
            audio_frames_stale: c.audio_stale.load(Ordering::Relaxed),
            seek_serial: *shared.seek_serial.lock().unwrap(),
            first_pts_after_seek: *shared.first_pts_after_seek.lock().unwrap(),
            stale_frames_displayed: c.stale_displayed.load(Ordering::Relaxed),
            stats: shared.stats.lock().unwrap().clone(),
        }
    }
}

fn spawn<F>(name: &str, body: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(|e| Error::Thread(format!("failed to spawn {}: {}", name, e)))
}

fn sleep_ms(ms: ClockMs) {
    thread::sleep(clamp_millis_to_duration(ms));
}

/// Flush every queue and start a new generation
fn seek(shared: &Shared, target_ms: ClockMs) -> bool {
    for stream in shared.streams() {
        stream.queue().flush();
        if stream.queue().put_flush_marker().is_err() {
            return false;
        }
    }
    let serial = shared.video.queue().serial();
    *shared.seek_serial.lock().unwrap() = Some(serial);
    info!(target_ms, serial, "Seek");
    true
}

fn demux_loop(shared: &Shared, settings: &SimSettings, start: ClockMs) {
    let frame_ms = settings.frame_duration_ms();
    let audio_ms = settings.audio_packet_ms as ClockMs;
    let audio_bytes = shared
        .audio
        .as_ref()
        .map(|a| (a.desired_bandwidth().min * settings.audio_packet_ms / 1000) as usize)
        .unwrap_or(0);

    let mut video_pts: ClockMs = 0;
    let mut audio_pts: ClockMs = 0;
    let mut pos: i64 = 0;
    let mut seeked = false;

    debug!(frame_ms, audio_ms, "Demux thread started");

    while !shared.stopped() {
        if let Some(seek_at) = settings.seek_at_ms {
            if !seeked && now_ms() - start >= seek_at as ClockMs {
                seeked = true;
                if !seek(shared, settings.seek_target_ms) {
                    break;
                }
                video_pts = settings.seek_target_ms;
                audio_pts = settings.seek_target_ms;
            }
        }

        if shared.queues_full() {
            sleep_ms(REFRESH_RATE_MS);
            continue;
        }

        let (stream, pts, duration, bytes) = match &shared.audio {
            Some(audio) if audio_pts < video_pts => {
                let out = (audio, audio_pts, audio_ms, audio_bytes);
                audio_pts += audio_ms;
                out
            }
            _ => {
                let out = (&shared.video, video_pts, frame_ms, settings.video_packet_bytes);
                video_pts += frame_ms;
                out
            }
        };

        let tb = stream.time_base();
        let packet = Packet::data(
            stream.index(),
            vec![(pts & 0xff) as u8; bytes],
            Some(tb.ms_to_ticks(pts)),
            tb.ms_to_ticks(duration),
            pos,
        );
        pos += bytes as i64;

        stream.register_packet(&packet);
        if let Err(err) = stream.queue().put(packet) {
            debug!("Demux thread stopping: {}", err);
            break;
        }
        shared.counters.packets_demuxed.fetch_add(1, Ordering::Relaxed);
    }

    debug!("Demux thread exiting");
}

fn video_decode_loop(shared: &Shared, size: Size) {
    let mut feed = PacketFeed::new(Arc::clone(&shared.video));
    let tb = shared.video.time_base();

    loop {
        let packet = match feed.next_event() {
            FeedEvent::Aborted => break,
            FeedEvent::Flushed { serial } => {
                debug!(serial, "Video decoder flushed");
                continue;
            }
            FeedEvent::EndOfStream { serial } => {
                debug!(serial, "Video decoder drained");
                continue;
            }
            FeedEvent::Packet(packet) => packet,
        };

        let pts = packet.pts.map(|t| tb.ticks_to_ms(t));
        let drop_early = should_drop_early(
            pts,
            shared.master_clock(),
            shared.framedrop,
            shared.sync_mode,
            packet.serial,
            shared.video.clock_serial(),
            shared.video.queue().nb_packets(),
        );
        if drop_early {
            trace!(?pts, "Dropping video frame early");
            shared.stats.lock().unwrap().frame_drops_early += 1;
            continue;
        }

        let Some(mut slot) = shared.video_frames.peek_writable() else {
            break;
        };
        slot.pts = pts;
        slot.duration = tb.ticks_to_ms(packet.duration);
        slot.serial = packet.serial;
        slot.pos = packet.pos;
        slot.size = size;
        slot.sar = Rational::new(1, 1);
        slot.data.clear();
        slot.data.extend_from_slice(&packet.data);
        slot.push();

        shared.counters.video_decoded.fetch_add(1, Ordering::Relaxed);
    }

    debug!("Video decode thread exiting");
}

fn audio_decode_loop(shared: &Shared, settings: &SimSettings) {
    let Some(audio) = shared.audio.as_ref() else {
        return;
    };
    let mut feed = PacketFeed::new(Arc::clone(audio));
    let tb = audio.time_base();
    let samples = (settings.audio_sample_rate as u64 * settings.audio_packet_ms / 1000) as usize
        * settings.audio_channels as usize;

    loop {
        let packet = match feed.next_event() {
            FeedEvent::Aborted => break,
            FeedEvent::Flushed { serial } => {
                debug!(serial, "Audio decoder flushed");
                continue;
            }
            FeedEvent::EndOfStream { .. } => continue,
            FeedEvent::Packet(packet) => packet,
        };

        let Some(mut slot) = shared.audio_frames.peek_writable() else {
            break;
        };
        slot.pts = packet.pts.map(|t| tb.ticks_to_ms(t));
        slot.duration = tb.ticks_to_ms(packet.duration);
        slot.serial = packet.serial;
        slot.pos = packet.pos;
        slot.sample_rate = settings.audio_sample_rate;
        slot.channels = settings.audio_channels;
        slot.samples.clear();
        slot.samples.resize(samples, 0.0);
        slot.push();

        shared.counters.audio_decoded.fetch_add(1, Ordering::Relaxed);
    }

    debug!("Audio decode thread exiting");
}

fn audio_render_loop(shared: &Shared) {
    let Some(audio) = shared.audio.as_ref() else {
        return;
    };

    while !shared.stopped() {
        let (pts, duration, serial) = match shared.audio_frames.peek_readable() {
            Some(frame) => (frame.pts, frame.duration, frame.serial()),
            None => break,
        };

        if serial != audio.queue().serial() {
            shared.audio_frames.pop();
            shared.counters.audio_stale.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        if let Some(pts) = pts {
            audio.set_clock_at(pts, serial, now_ms());
        }
        shared.audio_frames.pop();
        shared.counters.audio_played.fetch_add(1, Ordering::Relaxed);

        sleep_ms(duration);
    }

    debug!("Audio render thread exiting");
}

fn video_render_loop(shared: &Shared) {
    let mut presenter =
        VideoPresenter::new(shared.sync_mode, shared.framedrop, shared.max_frame_duration);
    let mut newest_serial: Serial = 0;

    while !shared.stopped() {
        let action = {
            let mut stats = shared.stats.lock().unwrap();
            presenter.refresh(
                &shared.video_frames,
                &shared.video,
                shared.audio.as_deref(),
                &mut stats,
                false,
                now_ms(),
            )
        };

        let pause = match action {
            RefreshAction::Display { pts, serial } => {
                if serial < newest_serial {
                    warn!(serial, newest_serial, "Displayed a frame from an older generation");
                    shared.counters.stale_displayed.fetch_add(1, Ordering::Relaxed);
                }
                if serial > newest_serial {
                    newest_serial = serial;
                    let seek_serial = *shared.seek_serial.lock().unwrap();
                    if seek_serial == Some(serial) {
                        *shared.first_pts_after_seek.lock().unwrap() = pts;
                    }
                }
                trace!(?pts, serial, "Display");
                update_stats(shared);
                0
            }
            RefreshAction::Wait(ms) => ms.min(REFRESH_RATE_MS),
            RefreshAction::Idle => REFRESH_RATE_MS,
        };

        if pause > 0 {
            sleep_ms(pause);
        }
    }

    debug!("Video render thread exiting");
}

fn update_stats(shared: &Shared) {
    let master = shared.master_clock();
    let video_clock = shared.video.get_clock();
    let audio_clock = shared.audio.as_ref().and_then(|a| a.get_clock());
    let video_queue_size = shared.video.queue().size();
    let video_bandwidth = shared.video.bandwidth();
    let (audio_queue_size, audio_bandwidth) = shared
        .audio
        .as_ref()
        .map(|a| (a.queue().size(), a.bandwidth()))
        .unwrap_or((0, 0));

    let mut stats = shared.stats.lock().unwrap();
    stats.master_clock = master;
    stats.video_clock = video_clock;
    stats.audio_clock = audio_clock;
    stats.fmt = StreamFormat::from_streams(shared.audio.is_some(), true);
    stats.video_queue_size = video_queue_size;
    stats.audio_queue_size = audio_queue_size;
    stats.video_bandwidth = video_bandwidth;
    stats.audio_bandwidth = audio_bandwidth;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_config() -> PlayerConfig {
        let mut config = PlayerConfig::default();
        config.simulation.duration_ms = 400;
        config
    }

    #[test]
    fn test_simulation_rejects_invalid_config() {
        let mut config = short_config();
        config.simulation.video_fps = 0;
        assert!(Simulation::new(config).is_err());
    }

    #[test]
    fn test_video_only_falls_back_to_video_master() {
        let mut config = short_config();
        config.simulation.with_audio = false;
        let report = Simulation::new(config).unwrap().run().unwrap();

        assert_eq!(report.sync_mode, SyncMode::VideoMaster);
        assert_eq!(report.stats.fmt, StreamFormat::VideoOnly);
        assert_eq!(report.audio_frames_decoded, 0);
        assert!(report.stats.frame_processed > 0);
    }
}
