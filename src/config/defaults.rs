pub const DEFAULT_THRESHOLD_DB: f64 = 90.0;
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_TICK_MS: u64 = 100;
pub const DEFAULT_WINDOW_MS: u64 = crate::audio::DEFAULT_WINDOW_MS;

pub const DEFAULT_FRONT_CAMERA: u32 = 0;
pub const DEFAULT_BACK_CAMERA: u32 = 1;
pub const DEFAULT_FPS: u32 = 120;
pub const DEFAULT_FRAME_WIDTH: u32 = 1280;
pub const DEFAULT_FRAME_HEIGHT: u32 = 720;
pub const DEFAULT_SECONDS_TO_RECORD: u32 = 4;
pub const DEFAULT_PLAYBACK_SPEED: f64 = crate::video::DEFAULT_PLAYBACK_SPEED;
pub const DEFAULT_CLIPS_DIR: &str = "videos";
pub const DEFAULT_JPEG_QUALITY: u8 = crate::video::DEFAULT_JPEG_QUALITY;

pub const DEFAULT_MAX_RESTARTS: u32 = 5;
pub const DEFAULT_RESTART_BACKOFF_MS: u64 = 500;
pub const DEFAULT_RESTART_BACKOFF_MAX_MS: u64 = 30_000;

pub(super) const MAX_SECONDS_TO_RECORD: u32 = 60;
pub(super) const MAX_FPS: u32 = 480;
pub(super) const MAX_FRAME_DIMENSION: u32 = 7_680;
/// Upper bound on frames held per stream, to keep memory in check.
pub(super) const MAX_BUFFERED_FRAMES: u64 = 14_400;
pub(super) const MAX_DEVICE_NAME_LEN: usize = 256;
