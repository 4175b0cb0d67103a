//! Threshold detector with debounce.
//!
//! One strike stays loud across several consecutive ticks; the minimum
//! re-trigger interval keeps it from producing a burst of detections.

use super::window::SampleWindow;
use anyhow::{Context, Result};
use crossbeam_channel::{bounded, select, tick, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// Log the live level once every this many ticks.
const LEVEL_LOG_EVERY: u64 = 5;

/// A loudness spike that crossed the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub loudness_db: f64,
    pub occurred_at: Instant,
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub threshold_db: f64,
    pub min_interval: Duration,
    pub tick_interval: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold_db: 90.0,
            min_interval: Duration::from_secs(5),
            tick_interval: Duration::from_millis(100),
        }
    }
}

/// Decides whether a measured level becomes a [`Detection`].
///
/// Both comparisons are strict: a level equal to the threshold does not
/// trigger, and a second detection needs strictly more than `min_interval`.
#[derive(Debug, Clone)]
pub struct ThresholdGate {
    threshold_db: f64,
    min_interval: Duration,
    last_emission: Option<Instant>,
}

impl ThresholdGate {
    pub fn new(threshold_db: f64, min_interval: Duration) -> Self {
        Self {
            threshold_db,
            min_interval,
            last_emission: None,
        }
    }

    pub fn from_config(cfg: &DetectorConfig) -> Self {
        Self::new(cfg.threshold_db, cfg.min_interval)
    }

    pub fn evaluate(&mut self, loudness_db: f64, now: Instant) -> Option<Detection> {
        if loudness_db.is_nan() || loudness_db <= self.threshold_db {
            return None;
        }
        if let Some(last) = self.last_emission {
            if now.saturating_duration_since(last) <= self.min_interval {
                return None;
            }
        }
        self.last_emission = Some(now);
        Some(Detection {
            loudness_db,
            occurred_at: now,
        })
    }

    pub fn last_emission(&self) -> Option<Instant> {
        self.last_emission
    }
}

/// Handle for the detector tick thread.
pub struct DetectorHandle {
    stop_tx: Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl DetectorHandle {
    /// Stop ticking and wait for the thread, even if it is blocked handing
    /// off a detection.
    pub fn stop(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("audio detector thread panicked");
            }
        }
    }
}

impl Drop for DetectorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start the tick loop over `window`.
///
/// Detections are handed off synchronously: with a zero-capacity channel the
/// tick blocks until the consumer takes the detection, so none is dropped
/// and the detector stalls if the consumer stalls. The window lock is only
/// held while the level is computed, never during the hand-off.
pub fn spawn_detector(
    window: SampleWindow,
    cfg: DetectorConfig,
    detections: Sender<Detection>,
) -> Result<DetectorHandle> {
    let (stop_tx, stop_rx) = bounded::<()>(1);
    let handle = thread::Builder::new()
        .name("strikecam-detector".to_string())
        .spawn(move || {
            let ticker = tick(cfg.tick_interval);
            let mut gate = ThresholdGate::from_config(&cfg);
            let mut ticks = 0u64;
            tracing::info!(
                threshold_db = cfg.threshold_db,
                min_interval_ms = cfg.min_interval.as_millis() as u64,
                "audio detection started"
            );
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        let level = window.loudness_db();
                        ticks = ticks.wrapping_add(1);
                        if ticks % LEVEL_LOG_EVERY == 0 {
                            tracing::debug!("sound level: {level:.1} dB");
                        }
                        let Some(detection) = gate.evaluate(level, Instant::now()) else {
                            continue;
                        };
                        tracing::info!("loud sound detected at {:.1} dB", detection.loudness_db);
                        select! {
                            send(detections, detection) -> res => {
                                if res.is_err() {
                                    tracing::debug!("detection consumer gone; stopping detector");
                                    break;
                                }
                            }
                            recv(stop_rx) -> _ => break,
                        }
                    }
                }
            }
            tracing::info!("audio detection stopped");
        })
        .context("failed to spawn detector thread")?;
    Ok(DetectorHandle {
        stop_tx,
        handle: Some(handle),
    })
}
