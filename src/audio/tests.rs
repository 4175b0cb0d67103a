use super::dispatch::append_downmixed_samples;
use super::{
    loudness_db, rms, spawn_detector, DetectorConfig, SampleWindow, ThresholdGate,
    REFERENCE_LEVEL,
};
use crossbeam_channel::bounded;
use std::time::{Duration, Instant};

/// Constant amplitude that measures `db` on the detector scale.
fn amplitude_for_db(db: f64) -> f32 {
    (REFERENCE_LEVEL * 10f64.powf(db / 20.0)) as f32
}

#[test]
fn downmixes_multi_channel_audio() {
    let mut buf = Vec::new();
    let samples = [1.0f32, -1.0, 0.5, 0.5];
    append_downmixed_samples(&mut buf, &samples, 2, |sample| sample);
    assert_eq!(buf, vec![0.0, 0.5]);
}

#[test]
fn preserves_single_channel_audio() {
    let mut buf = Vec::new();
    let samples = [0.1f32, 0.2, 0.3];
    append_downmixed_samples(&mut buf, &samples, 1, |sample| sample);
    assert_eq!(buf, samples);
}

#[test]
fn rms_of_constant_signal_is_its_magnitude() {
    let samples = [0.25f32, -0.25, 0.25, -0.25];
    assert!((rms(samples.iter()) - 0.25).abs() < 1e-9);
}

#[test]
fn silence_is_negative_infinity() {
    let samples = vec![0.0f32; 4410];
    assert_eq!(loudness_db(samples.iter()), f64::NEG_INFINITY);
    assert_eq!(loudness_db(Vec::<f32>::new().iter()), f64::NEG_INFINITY);
}

#[test]
fn silence_never_triggers_even_with_lowest_threshold() {
    let samples = vec![0.0f32; 128];
    let mut gate = ThresholdGate::new(f64::MIN, Duration::ZERO);
    assert!(gate
        .evaluate(loudness_db(samples.iter()), Instant::now())
        .is_none());
}

#[test]
fn full_scale_square_wave_reads_about_96_db() {
    let samples: Vec<f32> = (0..64).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
    let db = loudness_db(samples.iter());
    assert!((db - 96.33).abs() < 0.01, "got {db}");
}

#[test]
fn threshold_boundary_does_not_trigger() {
    let samples = vec![amplitude_for_db(80.0); 32];
    let level = loudness_db(samples.iter());
    let mut gate = ThresholdGate::new(level, Duration::ZERO);
    assert!(gate.evaluate(level, Instant::now()).is_none());

    let mut lower = ThresholdGate::new(level - 0.001, Duration::ZERO);
    assert!(lower.evaluate(level, Instant::now()).is_some());
}

#[test]
fn sustained_strike_over_three_ticks_emits_once() {
    let samples = vec![amplitude_for_db(80.0); 4410];
    let level = loudness_db(samples.iter());
    assert!((level - 80.0).abs() < 0.01, "got {level}");

    let mut gate = ThresholdGate::new(75.0, Duration::from_secs(5));
    let base = Instant::now();
    let emitted: Vec<_> = (0..3)
        .filter_map(|i| gate.evaluate(level, base + Duration::from_millis(100 * i)))
        .collect();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].occurred_at, base);
    assert!((emitted[0].loudness_db - 80.0).abs() < 0.01);
}

#[test]
fn continuous_loud_signal_respects_min_interval() {
    let min_interval = Duration::from_millis(250);
    let mut gate = ThresholdGate::new(60.0, min_interval);
    let base = Instant::now();
    let emitted: Vec<Instant> = (0..40)
        .filter_map(|i| gate.evaluate(90.0, base + Duration::from_millis(100 * i)))
        .map(|detection| detection.occurred_at)
        .collect();

    assert!(emitted.len() > 1);
    for pair in emitted.windows(2) {
        assert!(pair[1] - pair[0] > min_interval);
    }
    // Strict comparison: 300 ms spacing on a 100 ms tick, not 200 ms.
    assert_eq!(emitted[1] - emitted[0], Duration::from_millis(300));
}

#[test]
fn gate_records_last_emission() {
    let mut gate = ThresholdGate::new(50.0, Duration::from_secs(1));
    assert!(gate.last_emission().is_none());
    let now = Instant::now();
    gate.evaluate(70.0, now);
    assert_eq!(gate.last_emission(), Some(now));
    gate.evaluate(40.0, now + Duration::from_secs(3));
    assert_eq!(gate.last_emission(), Some(now));
}

#[test]
fn window_keeps_only_most_recent_samples() {
    let window = SampleWindow::with_capacity(4);
    window.push(&[1.0, 1.0, 1.0]);
    window.push(&[0.0, 0.0, 0.0]);
    assert_eq!(window.len(), 4);
    // One loud sample left out of four.
    let expected = loudness_db([1.0f32, 0.0, 0.0, 0.0].iter());
    assert!((window.loudness_db() - expected).abs() < 1e-9);

    window.push(&[0.5; 10]);
    assert_eq!(window.len(), 4);
    let expected = loudness_db([0.5f32; 4].iter());
    assert!((window.loudness_db() - expected).abs() < 1e-9);
}

#[test]
fn window_sized_from_duration() {
    let window = SampleWindow::for_duration(44_100, Duration::from_millis(100));
    assert_eq!(window.capacity(), 4410);
    assert!(window.is_empty());
}

#[test]
fn detector_thread_emits_for_loud_window_and_stops() {
    let window = SampleWindow::with_capacity(64);
    window.push(&[amplitude_for_db(85.0); 64]);
    let (tx, rx) = bounded(0);
    let cfg = DetectorConfig {
        threshold_db: 75.0,
        min_interval: Duration::from_secs(60),
        tick_interval: Duration::from_millis(10),
    };
    let mut handle = spawn_detector(window, cfg, tx).expect("spawn detector");

    let detection = rx
        .recv_timeout(Duration::from_secs(2))
        .expect("expected a detection");
    assert!(detection.loudness_db > 75.0);
    // Debounced: nothing else within the interval.
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

    handle.stop();
}

#[test]
fn detector_stop_interrupts_blocked_handoff() {
    let window = SampleWindow::with_capacity(16);
    window.push(&[amplitude_for_db(95.0); 16]);
    let (tx, _rx) = bounded(0);
    let cfg = DetectorConfig {
        threshold_db: 50.0,
        min_interval: Duration::ZERO,
        tick_interval: Duration::from_millis(5),
    };
    let mut handle = spawn_detector(window, cfg, tx).expect("spawn detector");
    // Nobody receives, so the tick is parked in the hand-off.
    std::thread::sleep(Duration::from_millis(50));
    let started = Instant::now();
    handle.stop();
    assert!(started.elapsed() < Duration::from_secs(1));
}
