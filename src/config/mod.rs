//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

pub use defaults::{
    DEFAULT_BACK_CAMERA, DEFAULT_CLIPS_DIR, DEFAULT_FPS, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH,
    DEFAULT_FRONT_CAMERA, DEFAULT_JPEG_QUALITY, DEFAULT_MAX_RESTARTS, DEFAULT_MIN_INTERVAL_MS,
    DEFAULT_PLAYBACK_SPEED, DEFAULT_RESTART_BACKOFF_MAX_MS, DEFAULT_RESTART_BACKOFF_MS,
    DEFAULT_SECONDS_TO_RECORD, DEFAULT_THRESHOLD_DB, DEFAULT_TICK_MS, DEFAULT_WINDOW_MS,
};

/// CLI options for StrikeCam. Everything is checked by `validate` before any
/// device is opened.
#[derive(Debug, Parser, Clone)]
#[command(
    about = "StrikeCam: strike-triggered dual camera capture with slow-motion replay",
    author,
    version
)]
pub struct AppConfig {
    /// Preferred audio input device name
    #[arg(long, env = "STRIKECAM_INPUT_DEVICE")]
    pub input_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Print detected cameras and exit
    #[arg(long = "list-cameras", default_value_t = false)]
    pub list_cameras: bool,

    /// Loudness that counts as a strike (dB, strictly exceeded)
    #[arg(long = "threshold-db", default_value_t = DEFAULT_THRESHOLD_DB)]
    pub threshold_db: f64,

    /// Minimum time between two detections (milliseconds)
    #[arg(long = "min-interval-ms", default_value_t = DEFAULT_MIN_INTERVAL_MS)]
    pub min_interval_ms: u64,

    /// How often the audio level is measured (milliseconds)
    #[arg(long = "tick-ms", default_value_t = DEFAULT_TICK_MS)]
    pub tick_ms: u64,

    /// Length of the audio window measured on each tick (milliseconds)
    #[arg(long = "audio-window-ms", default_value_t = DEFAULT_WINDOW_MS)]
    pub audio_window_ms: u64,

    /// Front camera device index
    #[arg(long = "front-camera", default_value_t = DEFAULT_FRONT_CAMERA)]
    pub front_camera: u32,

    /// Back camera device index
    #[arg(long = "back-camera", default_value_t = DEFAULT_BACK_CAMERA)]
    pub back_camera: u32,

    /// Requested capture rate (frames per second)
    #[arg(long, default_value_t = DEFAULT_FPS)]
    pub fps: u32,

    /// Requested frame width (pixels)
    #[arg(long, default_value_t = DEFAULT_FRAME_WIDTH)]
    pub width: u32,

    /// Requested frame height (pixels)
    #[arg(long, default_value_t = DEFAULT_FRAME_HEIGHT)]
    pub height: u32,

    /// Seconds of video kept in each clip
    #[arg(long, default_value_t = DEFAULT_SECONDS_TO_RECORD)]
    pub seconds: u32,

    /// Video kept after the strike (milliseconds, default: half of --seconds)
    #[arg(long = "post-event-ms")]
    pub post_event_ms: Option<u64>,

    /// Replay speed multiplier (0.25 is quarter speed)
    #[arg(long = "playback-speed", default_value_t = DEFAULT_PLAYBACK_SPEED)]
    pub playback_speed: f64,

    /// Directory clips are written to
    #[arg(long = "clips-dir", env = "STRIKECAM_CLIPS_DIR", default_value = DEFAULT_CLIPS_DIR)]
    pub clips_dir: PathBuf,

    /// JPEG quality for stored frames (1-100)
    #[arg(long = "jpeg-quality", default_value_t = DEFAULT_JPEG_QUALITY)]
    pub jpeg_quality: u8,

    /// Keep frames as delivered instead of turning them 180 degrees
    #[arg(long = "no-rotate", default_value_t = false)]
    pub no_rotate: bool,

    /// Restarts allowed when the pipeline fails to start
    #[arg(long = "max-restarts", default_value_t = DEFAULT_MAX_RESTARTS)]
    pub max_restarts: u32,

    /// First wait between restarts (milliseconds, doubles each time)
    #[arg(long = "restart-backoff-ms", default_value_t = DEFAULT_RESTART_BACKOFF_MS)]
    pub restart_backoff_ms: u64,

    /// Longest wait between restarts (milliseconds)
    #[arg(
        long = "restart-backoff-max-ms",
        default_value_t = DEFAULT_RESTART_BACKOFF_MAX_MS
    )]
    pub restart_backoff_max_ms: u64,

    /// Maximum log level
    #[arg(
        long = "log-level",
        env = "STRIKECAM_LOG_LEVEL",
        value_enum,
        default_value_t = LogLevel::Info
    )]
    pub log_level: LogLevel,

    /// Write JSON trace lines to a file instead of human-readable stderr logs
    #[arg(long = "trace-json", env = "STRIKECAM_TRACE_JSON", default_value_t = false)]
    pub trace_json: bool,

    /// Disable all logging
    #[arg(long = "no-logs", env = "STRIKECAM_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    pub fn as_tracing(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}
