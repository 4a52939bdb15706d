//! Pipeline simulator (playsync-sim) - Main entry point
//!
//! Runs the media sync core against a synthetic audio/video source and
//! prints what the render side observed: frames shown and dropped, clock
//! drift, queue fill and bandwidth.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use playsync_common::logging::init_tracing;
use playsync_core::media::sync::{FrameDropPolicy, SyncMode};
use playsync_core::{PlayerConfig, Simulation};
use tracing::info;

/// Command-line arguments for playsync-sim
#[derive(Parser, Debug)]
#[command(name = "playsync-sim")]
#[command(about = "Simulate a demux/decode/render pipeline on the playsync core")]
#[command(version)]
struct Args {
    /// Config file (overrides PLAYSYNC_CONFIG and the default locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run time in milliseconds
    #[arg(short, long, env = "PLAYSYNC_SIM_DURATION_MS")]
    duration_ms: Option<u64>,

    /// Master clock: audio or video
    #[arg(long)]
    sync: Option<SyncMode>,

    /// Late frame dropping: auto, on or off
    #[arg(long)]
    framedrop: Option<FrameDropPolicy>,

    /// Seek after this many milliseconds of playback
    #[arg(long)]
    seek_at_ms: Option<u64>,

    /// Disable the audio stream
    #[arg(long)]
    no_audio: bool,

    /// Log level or filter directive (RUST_LOG takes precedence)
    #[arg(long, env = "PLAYSYNC_LOG")]
    log_level: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn apply(&self, config: &mut PlayerConfig) {
        if let Some(duration_ms) = self.duration_ms {
            config.simulation.duration_ms = duration_ms;
        }
        if let Some(sync) = self.sync {
            config.sync_mode = sync;
        }
        if let Some(framedrop) = self.framedrop {
            config.framedrop = framedrop;
        }
        if self.seek_at_ms.is_some() {
            config.simulation.seek_at_ms = self.seek_at_ms;
        }
        if self.no_audio {
            config.simulation.with_audio = false;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        PlayerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);

    init_tracing(&config.logging).context("Failed to initialize logging")?;

    info!(
        "Starting playsync-sim for {} ms ({} master)",
        config.simulation.duration_ms, config.sync_mode
    );

    let simulation = Simulation::new(config).context("Invalid simulation settings")?;
    let report = simulation.run().context("Simulation failed")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        println!("{}", report);
    }

    Ok(())
}
