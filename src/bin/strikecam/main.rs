//! StrikeCam entrypoint.
//!
//! Listens for a strike on the microphone and keeps the last few seconds of
//! two cameras in memory. Each strike saves both clips once the post-event
//! window has been captured, then replays them in slow motion side by side.
//!
//! # Threads
//!
//! - Audio intake and detector tick
//! - Per camera: reader, capture loop, clip worker, playback
//! - Main thread: the viewer window, which polls both display surfaces

mod cli_utils;
mod viewer;

use anyhow::Result;
use strikecam::config::AppConfig;
use strikecam::telemetry::{init_tracing, tracing_log_path};
use strikecam::{run_with_retry, NativeDevices, Pipeline};

use crate::cli_utils::{list_cameras, list_input_devices};

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    if config.list_input_devices {
        return list_input_devices();
    }
    if config.list_cameras {
        return list_cameras();
    }

    init_tracing(&config);
    if config.trace_json && !config.no_logs {
        eprintln!("StrikeCam trace log: {}", tracing_log_path().display());
    }
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = config.log_level.label(),
        clips_dir = %config.clips_dir.display(),
        "starting strikecam"
    );

    let pipeline_config = config.pipeline_config();
    let pipeline = run_with_retry(&config.retry_policy(), |attempt| {
        tracing::info!(attempt, "starting pipeline");
        Pipeline::start(&pipeline_config, &NativeDevices)
    })?;

    viewer::run(pipeline)
}
