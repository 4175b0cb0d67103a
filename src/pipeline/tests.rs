use super::trigger::fire_after;
use super::{run_with_retry, save_delay, DeviceBackend, Pipeline, PipelineConfig, RetryPolicy};
use crate::audio::{AudioIntake, AudioSettings, Detection, DetectorConfig, SampleWindow};
use crate::video::{CameraDevice, CameraSettings, CaptureSettings, SaveTrigger};
use anyhow::{anyhow, bail, Result};
use crossbeam_channel::bounded;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn detection_aged(age: Duration) -> Detection {
    Detection {
        loudness_db: 92.0,
        occurred_at: Instant::now().checked_sub(age).unwrap(),
    }
}

#[test]
fn save_waits_for_the_rest_of_the_post_event_window() {
    let delay = save_delay(Duration::from_secs(2), Duration::from_secs(1)).unwrap();
    assert_eq!(delay, Duration::from_secs(1));
    assert_eq!(
        save_delay(Duration::from_millis(500), Duration::from_millis(120)),
        Some(Duration::from_millis(380))
    );
}

#[test]
fn late_detection_saves_immediately() {
    assert_eq!(save_delay(Duration::from_secs(2), Duration::from_secs(2)), None);
    assert_eq!(save_delay(Duration::from_secs(2), Duration::from_secs(3)), None);
    assert_eq!(save_delay(Duration::ZERO, Duration::ZERO), None);
}

#[test]
fn trigger_waits_out_the_post_event_window_before_saving() {
    let (trigger, saves) = SaveTrigger::detached("front", Duration::from_secs(2));
    let (_cancel_tx, cancel_rx) = bounded::<()>(0);
    let detection = detection_aged(Duration::from_secs(1));
    let started = Instant::now();
    let waiter = thread::spawn(move || fire_after(&trigger, &detection, &cancel_rx));

    saves.recv_timeout(Duration::from_secs(5)).unwrap();
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(900), "saved after {waited:?}");
    assert!(waited < Duration::from_secs(2), "saved after {waited:?}");
    waiter.join().unwrap();
}

#[test]
fn late_trigger_saves_without_waiting() {
    let (trigger, saves) = SaveTrigger::detached("back", Duration::from_millis(200));
    let (_cancel_tx, cancel_rx) = bounded::<()>(0);
    fire_after(&trigger, &detection_aged(Duration::from_secs(1)), &cancel_rx);
    assert!(saves.try_recv().is_ok());
}

#[test]
fn shutdown_while_waiting_cancels_the_save() {
    let (trigger, saves) = SaveTrigger::detached("front", Duration::from_secs(5));
    let (cancel_tx, cancel_rx) = bounded::<()>(0);
    let detection = detection_aged(Duration::ZERO);
    let waiter = thread::spawn(move || fire_after(&trigger, &detection, &cancel_rx));

    thread::sleep(Duration::from_millis(50));
    let started = Instant::now();
    drop(cancel_tx);
    waiter.join().unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(saves.try_recv().is_err());
}

#[test]
fn backoff_doubles_until_capped() {
    let policy = RetryPolicy {
        max_attempts: 10,
        initial_backoff: Duration::from_millis(500),
        max_backoff: Duration::from_secs(3),
    };
    assert_eq!(policy.backoff_for(1), Duration::from_millis(500));
    assert_eq!(policy.backoff_for(2), Duration::from_secs(1));
    assert_eq!(policy.backoff_for(3), Duration::from_secs(2));
    assert_eq!(policy.backoff_for(4), Duration::from_secs(3));
    assert_eq!(policy.backoff_for(60), Duration::from_secs(3));
}

fn instant_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::ZERO,
        max_backoff: Duration::ZERO,
    }
}

#[test]
fn retry_returns_first_success() {
    let calls = Cell::new(0);
    let value = run_with_retry(&instant_policy(5), |attempt| {
        calls.set(calls.get() + 1);
        if attempt < 3 {
            bail!("device busy");
        }
        Ok(attempt * 10)
    })
    .unwrap();
    assert_eq!(value, 30);
    assert_eq!(calls.get(), 3);
}

#[test]
fn retry_gives_up_with_last_error() {
    let calls = Cell::new(0);
    let err = run_with_retry(&instant_policy(3), |_| -> Result<()> {
        calls.set(calls.get() + 1);
        Err(anyhow!("camera 7 missing"))
    })
    .unwrap_err();
    assert_eq!(calls.get(), 3);
    let message = format!("{err:#}");
    assert!(message.contains("3 attempts"), "{message}");
    assert!(message.contains("camera 7 missing"), "{message}");
}

#[test]
fn zero_attempt_policy_still_tries_once() {
    let calls = Cell::new(0);
    let _ = run_with_retry(&instant_policy(0), |_| -> Result<()> {
        calls.set(calls.get() + 1);
        bail!("nope")
    });
    assert_eq!(calls.get(), 1);
}

struct QuietAudio {
    window: SampleWindow,
    stopped: Arc<AtomicBool>,
}

impl AudioIntake for QuietAudio {
    fn device_name(&self) -> &str {
        "quiet"
    }

    fn sample_rate(&self) -> u32 {
        1_000
    }

    fn window(&self) -> SampleWindow {
        self.window.clone()
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Audio opens; every camera fails.
struct NoCameras {
    audio_stopped: Arc<AtomicBool>,
}

impl DeviceBackend for NoCameras {
    fn open_audio(&self, _settings: &AudioSettings) -> Result<Box<dyn AudioIntake>> {
        Ok(Box::new(QuietAudio {
            window: SampleWindow::with_capacity(16),
            stopped: self.audio_stopped.clone(),
        }))
    }

    fn open_camera(&self, settings: &CameraSettings) -> Result<Box<dyn CameraDevice>> {
        bail!("camera {} unavailable", settings.index)
    }
}

fn config() -> PipelineConfig {
    let camera = |name: &str, index| CameraSettings {
        name: name.to_string(),
        index,
        width: 4,
        height: 4,
        fps: 10,
    };
    PipelineConfig {
        audio: AudioSettings::default(),
        detector: DetectorConfig::default(),
        cameras: [camera("front", 0), camera("back", 1)],
        capture: CaptureSettings::default(),
    }
}

#[test]
fn camera_failure_aborts_start_and_releases_audio() {
    let audio_stopped = Arc::new(AtomicBool::new(false));
    let backend = NoCameras {
        audio_stopped: audio_stopped.clone(),
    };
    let err = match Pipeline::start(&config(), &backend) {
        Ok(_) => panic!("start should fail without cameras"),
        Err(err) => err,
    };
    let message = format!("{err:#}");
    assert!(message.contains("front"), "{message}");
    assert!(message.contains("camera 0 unavailable"), "{message}");
    assert!(audio_stopped.load(Ordering::SeqCst));
}
