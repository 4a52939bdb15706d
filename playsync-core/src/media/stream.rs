//! Elementary stream state
//!
//! A `Stream` ties one packet queue, one playback clock and the download
//! accounting of a single audio, video or subtitle stream together. It is
//! shared between threads behind an `Arc`: the demuxer feeds the queue, the
//! decoder drains it and the renderer drives the clock.
//!
//! Clock reads use the queue's live serial as governing serial, so a clock
//! anchored before the last flush reads as `None`.

use super::bandwidth::{calculate_bandwidth, CodecParams, DesireBytesPerSec};
use super::clock::Clock;
use super::packet::Packet;
use super::packet_queue::PacketQueue;
use super::types::{Bandwidth, ClockMs, Rational, Serial, StreamKind};
use playsync_common::time::now_ms;
use std::sync::Mutex;
use tracing::debug;

/// Packets a stream must buffer before it counts as having enough data
pub const MIN_FRAMES: usize = 25;

/// Buffered duration that counts as enough data regardless of packet count
const ENOUGH_DURATION_MS: ClockMs = 1000;

#[derive(Debug, Default)]
struct Traffic {
    total_bytes: u64,

    /// Monotonic ms of the first packet in the current window
    start_ts: ClockMs,
}

/// One elementary stream
#[derive(Debug)]
pub struct Stream {
    kind: StreamKind,
    index: usize,
    time_base: Rational,
    frame_rate: Option<Rational>,
    attached_picture: bool,
    min_frames: usize,
    desired_bandwidth: DesireBytesPerSec,
    queue: PacketQueue,
    clock: Mutex<Clock>,
    traffic: Mutex<Traffic>,
}

impl Stream {
    /// Open a stream with an aborted, empty queue and an unset clock
    pub fn new(kind: StreamKind, index: usize, time_base: Rational) -> Self {
        debug!(%kind, index, %time_base, "Opening stream");
        Self {
            kind,
            index,
            time_base,
            frame_rate: None,
            attached_picture: false,
            min_frames: MIN_FRAMES,
            desired_bandwidth: DesireBytesPerSec::default(),
            queue: PacketQueue::new(),
            clock: Mutex::new(Clock::new()),
            traffic: Mutex::new(Traffic::default()),
        }
    }

    pub fn with_frame_rate(mut self, frame_rate: Rational) -> Self {
        self.frame_rate = Some(frame_rate);
        self
    }

    /// Mark the stream as a single cover-art picture
    pub fn with_attached_picture(mut self, attached: bool) -> Self {
        self.attached_picture = attached;
        self
    }

    pub fn with_min_frames(mut self, min_frames: usize) -> Self {
        self.min_frames = min_frames;
        self
    }

    /// Derive the desired bandwidth from the codec parameters
    pub fn with_codec_params(mut self, params: &CodecParams) -> Self {
        self.desired_bandwidth = params.desired_bandwidth();
        self
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn frame_rate(&self) -> Option<Rational> {
        self.frame_rate
    }

    pub fn is_attached_picture(&self) -> bool {
        self.attached_picture
    }

    pub fn queue(&self) -> &PacketQueue {
        &self.queue
    }

    /// Whether the demuxer may stop reading for this stream
    ///
    /// An aborted stream never has enough; an attached picture always does.
    /// Otherwise the queue must hold `min_frames` packets or more than one
    /// second of media.
    pub fn has_enough_packets(&self) -> bool {
        if self.queue.is_aborted() {
            return false;
        }
        if self.attached_picture {
            return true;
        }
        if self.queue.nb_packets() >= self.min_frames {
            return true;
        }
        self.time_base.ticks_to_ms(self.queue.duration()) > ENOUGH_DURATION_MS
    }

    /// Clock value, `None` if unset or obsolete
    pub fn get_clock(&self) -> Option<ClockMs> {
        let serial = self.queue.serial();
        self.clock.lock().unwrap().get_clock(serial)
    }

    pub fn get_clock_at(&self, now: ClockMs) -> Option<ClockMs> {
        let serial = self.queue.serial();
        self.clock.lock().unwrap().get_clock_at(serial, now)
    }

    pub fn set_clock(&self, pts: ClockMs, serial: Serial) {
        self.clock.lock().unwrap().set_clock(pts, serial);
    }

    pub fn set_clock_at(&self, pts: ClockMs, serial: Serial, time: ClockMs) {
        self.clock.lock().unwrap().set_clock_at(pts, serial, time);
    }

    /// Pause or resume the clock; restarts the bandwidth window
    pub fn set_paused(&self, paused: bool) {
        self.clock.lock().unwrap().set_paused(paused);
        *self.traffic.lock().unwrap() = Traffic::default();
    }

    pub fn set_clock_speed(&self, speed: f64) {
        let serial = self.queue.serial();
        self.clock.lock().unwrap().set_speed(speed, serial);
    }

    /// Re-anchor the clock at its current value
    pub fn sync_serial_clock(&self) {
        let serial = self.queue.serial();
        let mut clock = self.clock.lock().unwrap();
        if let Some(value) = clock.get_clock(serial) {
            clock.set_clock(value, serial);
        }
    }

    pub fn last_updated_clock(&self) -> ClockMs {
        self.clock.lock().unwrap().last_updated()
    }

    pub fn clock_serial(&self) -> Option<Serial> {
        self.clock.lock().unwrap().serial()
    }

    pub fn clock_pts(&self) -> ClockMs {
        self.clock.lock().unwrap().pts()
    }

    pub fn is_paused(&self) -> bool {
        self.clock.lock().unwrap().is_paused()
    }

    /// Count a received packet towards the bandwidth estimate
    pub fn register_packet(&self, packet: &Packet) {
        self.register_packet_at(packet, now_ms());
    }

    pub fn register_packet_at(&self, packet: &Packet, now: ClockMs) {
        let mut traffic = self.traffic.lock().unwrap();
        if traffic.total_bytes == 0 {
            traffic.start_ts = now;
        }
        traffic.total_bytes += packet.size() as u64;
    }

    /// Bytes per second received since the first registered packet
    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth_at(now_ms())
    }

    pub fn bandwidth_at(&self, now: ClockMs) -> Bandwidth {
        let traffic = self.traffic.lock().unwrap();
        calculate_bandwidth(traffic.total_bytes, now - traffic.start_ts)
    }

    pub fn total_downloaded_bytes(&self) -> u64 {
        self.traffic.lock().unwrap().total_bytes
    }

    pub fn desired_bandwidth(&self) -> DesireBytesPerSec {
        self.desired_bandwidth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::bandwidth::{desire_aac, AudioCodec};

    fn video_stream() -> Stream {
        Stream::new(StreamKind::Video, 0, Rational::new(1, 90_000))
            .with_frame_rate(Rational::new(25, 1))
            .with_min_frames(4)
    }

    fn packet(bytes: usize, duration: i64) -> Packet {
        Packet::data(0, vec![0u8; bytes], Some(0), duration, -1)
    }

    #[test]
    fn test_has_enough_packets_by_count() {
        let stream = video_stream();
        assert!(!stream.has_enough_packets(), "aborted queue never has enough");

        stream.queue().start();
        // flush marker + 2 packets
        stream.queue().put(packet(10, 3_600)).unwrap();
        stream.queue().put(packet(10, 3_600)).unwrap();
        assert!(!stream.has_enough_packets());

        stream.queue().put(packet(10, 3_600)).unwrap();
        assert!(stream.has_enough_packets());
    }

    #[test]
    fn test_has_enough_packets_by_duration() {
        let stream = video_stream().with_min_frames(100);
        stream.queue().start();

        // 2 x 0.6 s at 90 kHz
        stream.queue().put(packet(10, 54_000)).unwrap();
        assert!(!stream.has_enough_packets());
        stream.queue().put(packet(10, 54_000)).unwrap();
        assert!(stream.has_enough_packets());
    }

    #[test]
    fn test_attached_picture_always_has_enough() {
        let stream = video_stream().with_attached_picture(true);
        stream.queue().start();
        assert!(stream.has_enough_packets());

        stream.queue().abort();
        assert!(!stream.has_enough_packets());
    }

    #[test]
    fn test_clock_uses_queue_serial() {
        let stream = video_stream();
        stream.queue().start();
        let serial = stream.queue().serial();

        stream.set_clock_at(1_000, serial, 0);
        assert_eq!(stream.get_clock_at(100), Some(1_100));

        stream.queue().flush();
        stream.queue().put_flush_marker().unwrap();
        assert_eq!(stream.get_clock_at(100), None);
        assert_eq!(stream.clock_serial(), Some(serial));
    }

    #[test]
    fn test_bandwidth_window() {
        let stream = video_stream();
        stream.register_packet_at(&packet(500, 0), 1_000);
        stream.register_packet_at(&packet(1_500, 0), 1_200);

        assert_eq!(stream.total_downloaded_bytes(), 2_000);
        assert_eq!(stream.bandwidth_at(1_500), 4_000);
        assert_eq!(stream.bandwidth_at(1_000), 0);

        stream.set_paused(true);
        assert!(stream.is_paused());
        assert_eq!(stream.total_downloaded_bytes(), 0);
    }

    #[test]
    fn test_sync_serial_clock_reanchors() {
        let stream = video_stream();
        stream.queue().start();
        let serial = stream.queue().serial();
        stream.set_clock(5_000, serial);

        stream.sync_serial_clock();
        let value = stream.get_clock().unwrap();
        assert!((value - 5_000).abs() < 50);
        assert_eq!(stream.clock_serial(), Some(serial));
    }

    #[test]
    fn test_codec_params_set_desired_bandwidth() {
        let stream = Stream::new(StreamKind::Audio, 1, Rational::new(1, 48_000)).with_codec_params(
            &CodecParams::Audio {
                codec: AudioCodec::Aac,
                bit_rate: 0,
                sample_rate: 48_000,
                channels: 2,
            },
        );
        assert_eq!(stream.desired_bandwidth(), desire_aac(2));
        assert_eq!(stream.kind(), StreamKind::Audio);
        assert_eq!(stream.index(), 1);
    }
}
