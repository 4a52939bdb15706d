//! Integration tests for stream clocks and video presentation
//!
//! Tests clock obsolescence across seeks, buffering thresholds and the
//! presenter driving a keep-last frame queue fed from another thread.

use playsync_common::time::now_ms;
use playsync_core::media::sync::{master_clock, FrameDropPolicy, SyncMode};
use playsync_core::media::{
    FeedEvent, Packet, PacketFeed, Rational, RefreshAction, Stats, Stream, StreamKind,
    VideoFrameQueue, VideoPresenter,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn started(stream: Stream) -> Stream {
    stream.queue().start();
    stream
}

fn video_stream() -> Stream {
    started(
        Stream::new(StreamKind::Video, 0, Rational::new(1, 1000))
            .with_frame_rate(Rational::new(25, 1)),
    )
}

fn audio_stream() -> Stream {
    started(Stream::new(StreamKind::Audio, 1, Rational::new(1, 1000)))
}

fn seek(stream: &Stream) {
    stream.queue().flush();
    stream.queue().put_flush_marker().unwrap();
}

#[test]
fn test_clock_becomes_obsolete_after_seek() {
    let stream = video_stream();
    for _ in 0..4 {
        seek(&stream);
    }
    assert_eq!(stream.queue().serial(), 5);

    stream.set_clock_at(1_000, 5, 10_000);
    assert_eq!(stream.get_clock_at(10_250), Some(1_250));

    seek(&stream);
    assert_eq!(stream.queue().serial(), 6);
    assert_eq!(stream.get_clock_at(10_250), None);
    assert_eq!(stream.clock_serial(), Some(5));

    stream.set_clock_at(60_000, 6, 10_300);
    assert_eq!(stream.get_clock_at(10_300), Some(60_000));
}

#[test]
fn test_paused_clock_freezes() {
    let stream = audio_stream();
    stream.set_clock_at(500, 1, 2_000);
    stream.set_paused(true);

    assert!(stream.is_paused());
    assert_eq!(stream.get_clock_at(9_000), Some(500));

    stream.set_paused(false);
    assert_eq!(stream.get_clock_at(2_100), Some(600));
}

#[test]
fn test_master_clock_follows_mode() {
    let video = video_stream();
    let audio = audio_stream();
    video.set_clock(1_000, 1);
    audio.set_clock(2_000, 1);

    let from_audio = master_clock(SyncMode::AudioMaster, Some(&audio), &video).unwrap();
    let from_video = master_clock(SyncMode::VideoMaster, Some(&audio), &video).unwrap();
    assert!(from_audio >= 2_000 && from_audio < 2_500);
    assert!(from_video >= 1_000 && from_video < 1_500);

    // no audio stream: video drives
    let fallback = master_clock(SyncMode::AudioMaster, None, &video).unwrap();
    assert!(fallback >= 1_000 && fallback < 1_500);
}

#[test]
fn test_has_enough_packets_by_count_or_duration() {
    let by_count = video_stream().with_min_frames(3);
    for _ in 0..2 {
        by_count
            .queue()
            .put(Packet::data(0, vec![0; 10], Some(0), 1, -1))
            .unwrap();
    }
    // the start marker counts as a queued packet
    assert!(by_count.has_enough_packets());

    let by_duration = audio_stream();
    // drain the start marker so only data counts
    let _ = by_duration.queue().get(false);
    by_duration
        .queue()
        .put(Packet::data(1, vec![0; 10], Some(0), 600, -1))
        .unwrap();
    assert!(!by_duration.has_enough_packets());
    by_duration
        .queue()
        .put(Packet::data(1, vec![0; 10], Some(600), 600, -1))
        .unwrap();
    assert!(by_duration.has_enough_packets());

    by_duration.queue().abort();
    assert!(!by_duration.has_enough_packets());
}

#[test]
fn test_feed_discards_packets_from_before_seek() {
    let stream = Arc::new(video_stream());
    for pts in 0..3 {
        stream
            .queue()
            .put(Packet::data(0, vec![1; 8], Some(pts * 40), 40, -1))
            .unwrap();
    }

    let mut feed = PacketFeed::new(Arc::clone(&stream));
    assert_eq!(feed.next_event(), FeedEvent::Flushed { serial: 1 });

    seek(&stream);
    stream
        .queue()
        .put(Packet::data(0, vec![1; 8], Some(60_000), 40, -1))
        .unwrap();

    assert_eq!(feed.next_event(), FeedEvent::Flushed { serial: 2 });
    match feed.next_event() {
        FeedEvent::Packet(pkt) => assert_eq!(pkt.pts, Some(60_000)),
        other => panic!("expected post-seek packet, got {:?}", other),
    }
}

#[test]
fn test_presenter_displays_frames_from_decoder_thread() {
    let video = Arc::new(video_stream());
    let frames = Arc::new(VideoFrameQueue::new(true));
    let serial = video.queue().serial();

    let decoder = {
        let frames = Arc::clone(&frames);
        thread::spawn(move || {
            for i in 0..10 {
                let Some(mut slot) = frames.peek_writable() else {
                    return;
                };
                slot.pts = Some(i * 40);
                slot.duration = 40;
                slot.serial = serial;
                slot.push();
            }
        })
    };

    let mut presenter = VideoPresenter::new(SyncMode::VideoMaster, FrameDropPolicy::Off, 10_000);
    let mut stats = Stats::new();
    let mut shown = Vec::new();
    let deadline = now_ms() + 5_000;

    while shown.len() < 10 && now_ms() < deadline {
        match presenter.refresh(&frames, &video, None, &mut stats, false, now_ms()) {
            RefreshAction::Display { pts, .. } => shown.push(pts.unwrap()),
            RefreshAction::Wait(ms) => thread::sleep(Duration::from_millis(ms.clamp(1, 50) as u64)),
            RefreshAction::Idle => thread::sleep(Duration::from_millis(2)),
        }
    }

    frames.stop();
    decoder.join().unwrap();

    let expected: Vec<i64> = (0..10).map(|i| i * 40).collect();
    assert_eq!(shown, expected);
    assert_eq!(stats.frame_processed, 10);
    assert_eq!(stats.total_frame_drops(), 0);
    assert_eq!(video.clock_serial(), Some(serial));
}

#[test]
fn test_presenter_skips_frames_from_old_serial() {
    let video = video_stream();
    let frames = VideoFrameQueue::new(true);
    let old_serial = video.queue().serial();

    for (pts, serial) in [(0, old_serial), (40, old_serial)] {
        let mut slot = frames.peek_writable().unwrap();
        slot.pts = Some(pts);
        slot.duration = 40;
        slot.serial = serial;
        slot.push();
    }

    seek(&video);
    let mut presenter = VideoPresenter::new(SyncMode::VideoMaster, FrameDropPolicy::Auto, 10_000);
    let mut stats = Stats::new();

    assert_eq!(
        presenter.refresh(&frames, &video, None, &mut stats, false, 1_000),
        RefreshAction::Idle
    );
    assert_eq!(stats.frames_stale, 2);
    assert_eq!(stats.frame_processed, 0);
}
