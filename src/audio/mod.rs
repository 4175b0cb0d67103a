//! Strike detection from a live microphone feed.
//!
//! Audio is captured via CPAL into a short rolling window. A detector thread
//! measures the window's loudness on a fixed tick and emits a debounced
//! [`Detection`] whenever the level crosses the configured threshold.

/// Default rolling window length analysed on each tick.
pub const DEFAULT_WINDOW_MS: u64 = 100;

/// Reference level for the dB scale, as a fraction of full scale.
///
/// One 16-bit LSB measured at 32-bit capture scale: a full-scale square wave
/// reads about +96 dB and a full-scale sine about +93 dB.
pub const REFERENCE_LEVEL: f64 = 1.0 / 65_536.0;

mod detector;
mod dispatch;
mod loudness;
mod microphone;
#[cfg(test)]
mod tests;
mod window;

pub use detector::{spawn_detector, Detection, DetectorConfig, DetectorHandle, ThresholdGate};
pub use loudness::{loudness_db, rms};
pub use microphone::{AudioIntake, AudioSettings, Microphone};
pub use window::SampleWindow;
