//! End-to-end pipeline tests
//!
//! Runs the threaded simulation for short periods and checks the
//! invariants that must hold regardless of scheduling: no frame of an old
//! generation is shown after a seek, and disabled frame dropping never drops.
//! Timing-dependent counts are only checked loosely.

use playsync_core::media::sync::{FrameDropPolicy, SyncMode};
use playsync_core::media::StreamFormat;
use playsync_core::{PlayerConfig, Simulation};

fn config(duration_ms: u64) -> PlayerConfig {
    let mut config = PlayerConfig::default();
    config.simulation.duration_ms = duration_ms;
    config
}

#[test]
fn test_seek_never_shows_old_generation() {
    let mut config = config(1_500);
    config.simulation.seek_at_ms = Some(500);
    config.simulation.seek_target_ms = 60_000;

    let report = Simulation::new(config).unwrap().run().unwrap();

    assert_eq!(report.seek_serial, Some(2));
    assert_eq!(report.stale_frames_displayed, 0);
    if let Some(pts) = report.first_pts_after_seek {
        assert!(pts >= 60_000, "first frame after seek at {}", pts);
    }
    assert!(report.stats.frame_processed > 0);
    assert!(report.packets_demuxed > 0);
}

#[test]
fn test_audio_master_run_with_framedrop_off() {
    let mut config = config(800);
    config.sync_mode = SyncMode::AudioMaster;
    config.framedrop = FrameDropPolicy::Off;

    let report = Simulation::new(config).unwrap().run().unwrap();

    assert_eq!(report.sync_mode, SyncMode::AudioMaster);
    assert_eq!(report.stats.fmt, StreamFormat::AudioVideo);
    assert_eq!(report.stats.total_frame_drops(), 0);
    assert!(report.audio_frames_decoded >= report.audio_frames_played);
    assert!(report.video_frames_decoded >= report.stats.frame_processed);
    assert_eq!(report.seek_serial, None);
}

#[test]
fn test_report_serializes_to_json() {
    let mut config = config(300);
    config.simulation.with_audio = false;

    let report = Simulation::new(config).unwrap().run().unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["sync_mode"], "video_master");
    assert_eq!(json["stats"]["fmt"], "video_only");
    assert!(json["packets_demuxed"].as_u64().unwrap() > 0);
    assert!(report.finished_at >= report.started_at);
}

#[test]
fn test_zero_duration_is_rejected() {
    let config = config(0);
    assert!(Simulation::new(config).is_err());
}
