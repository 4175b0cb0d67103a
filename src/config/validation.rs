use super::defaults::{
    MAX_BUFFERED_FRAMES, MAX_DEVICE_NAME_LEN, MAX_FPS, MAX_FRAME_DIMENSION, MAX_SECONDS_TO_RECORD,
};
use super::AppConfig;
use crate::audio::{AudioSettings, DetectorConfig};
use crate::pipeline::{PipelineConfig, RetryPolicy};
use crate::video::{CameraSettings, CaptureSettings};
use anyhow::{bail, Result};
use clap::Parser;
use std::time::Duration;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize the device name.
    pub fn validate(&mut self) -> Result<()> {
        if !self.threshold_db.is_finite() {
            bail!("--threshold-db must be a finite number, got {}", self.threshold_db);
        }
        if !(10..=10_000).contains(&self.tick_ms) {
            bail!("--tick-ms must be between 10 and 10000, got {}", self.tick_ms);
        }
        if !(10..=5_000).contains(&self.audio_window_ms) {
            bail!(
                "--audio-window-ms must be between 10 and 5000, got {}",
                self.audio_window_ms
            );
        }
        if self.min_interval_ms > 3_600_000 {
            bail!(
                "--min-interval-ms must be at most 3600000 (one hour), got {}",
                self.min_interval_ms
            );
        }

        if !(1..=MAX_FPS).contains(&self.fps) {
            bail!("--fps must be between 1 and {MAX_FPS}, got {}", self.fps);
        }
        for (flag, value) in [("--width", self.width), ("--height", self.height)] {
            if !(1..=MAX_FRAME_DIMENSION).contains(&value) {
                bail!("{flag} must be between 1 and {MAX_FRAME_DIMENSION}, got {value}");
            }
        }
        if !(1..=MAX_SECONDS_TO_RECORD).contains(&self.seconds) {
            bail!(
                "--seconds must be between 1 and {MAX_SECONDS_TO_RECORD}, got {}",
                self.seconds
            );
        }
        let buffered = u64::from(self.fps) * u64::from(self.seconds);
        if buffered > MAX_BUFFERED_FRAMES {
            bail!(
                "--fps × --seconds buffers {buffered} frames per camera (max {MAX_BUFFERED_FRAMES})"
            );
        }
        if let Some(post_event_ms) = self.post_event_ms {
            let window_ms = u64::from(self.seconds) * 1_000;
            if post_event_ms > window_ms {
                bail!(
                    "--post-event-ms ({post_event_ms}) cannot exceed the recorded window ({window_ms} ms)"
                );
            }
        }
        if self.front_camera == self.back_camera {
            bail!(
                "--front-camera and --back-camera must differ, both are {}",
                self.front_camera
            );
        }

        if !self.playback_speed.is_finite() || !(0.01..=16.0).contains(&self.playback_speed) {
            bail!(
                "--playback-speed must be between 0.01 and 16.0, got {}",
                self.playback_speed
            );
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            bail!(
                "--jpeg-quality must be between 1 and 100, got {}",
                self.jpeg_quality
            );
        }
        if self.clips_dir.as_os_str().is_empty() {
            bail!("--clips-dir must not be empty");
        }
        if self.clips_dir.exists() && !self.clips_dir.is_dir() {
            bail!(
                "--clips-dir '{}' exists but is not a directory",
                self.clips_dir.display()
            );
        }

        if self.restart_backoff_ms > self.restart_backoff_max_ms {
            bail!(
                "--restart-backoff-ms ({}) cannot exceed --restart-backoff-max-ms ({})",
                self.restart_backoff_ms,
                self.restart_backoff_max_ms
            );
        }
        if self.max_restarts > 100 {
            bail!(
                "--max-restarts must be between 0 and 100, got {}",
                self.max_restarts
            );
        }

        if let Some(device) = &mut self.input_device {
            let trimmed = device.trim();
            if trimmed.is_empty()
                || trimmed.len() > MAX_DEVICE_NAME_LEN
                || trimmed.chars().any(char::is_control)
            {
                bail!(
                    "--input-device must be 1-{MAX_DEVICE_NAME_LEN} characters with no control characters"
                );
            }
            *device = trimmed.to_string();
        }

        Ok(())
    }

    /// Video kept after the strike: `--post-event-ms`, or half the window.
    pub fn post_event(&self) -> Duration {
        match self.post_event_ms {
            Some(ms) => Duration::from_millis(ms),
            None => Duration::from_millis(u64::from(self.seconds) * 1_000 / 2),
        }
    }

    /// Snapshot the CLI-controlled settings for a pipeline instance.
    pub fn pipeline_config(&self) -> PipelineConfig {
        let camera = |name: &str, index: u32| CameraSettings {
            name: name.to_string(),
            index,
            width: self.width,
            height: self.height,
            fps: self.fps,
        };
        PipelineConfig {
            audio: AudioSettings {
                preferred_device: self.input_device.clone(),
                window: Duration::from_millis(self.audio_window_ms),
            },
            detector: DetectorConfig {
                threshold_db: self.threshold_db,
                min_interval: Duration::from_millis(self.min_interval_ms),
                tick_interval: Duration::from_millis(self.tick_ms),
            },
            cameras: [camera("front", self.front_camera), camera("back", self.back_camera)],
            capture: CaptureSettings {
                fps: self.fps,
                seconds_to_record: self.seconds,
                post_event: self.post_event(),
                clips_dir: self.clips_dir.clone(),
                playback_speed: self.playback_speed,
                jpeg_quality: self.jpeg_quality,
                rotate_180: !self.no_rotate,
            },
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_restarts.saturating_add(1),
            initial_backoff: Duration::from_millis(self.restart_backoff_ms),
            max_backoff: Duration::from_millis(self.restart_backoff_max_ms),
        }
    }
}
