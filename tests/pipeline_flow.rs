use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use strikecam::audio::{AudioIntake, AudioSettings, DetectorConfig, SampleWindow};
use strikecam::video::{
    CameraDevice, CameraProfile, CameraSettings, CaptureSettings, ClipReader, DisplayWindow,
    Frame,
};
use strikecam::{run_with_retry, DeviceBackend, Pipeline, PipelineConfig, RetryPolicy};

fn scratch_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "strikecam-flow-{tag}-{}-{nanos}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

struct FakeAudio {
    window: SampleWindow,
}

impl AudioIntake for FakeAudio {
    fn device_name(&self) -> &str {
        "fake microphone"
    }

    fn sample_rate(&self) -> u32 {
        1_000
    }

    fn window(&self) -> SampleWindow {
        self.window.clone()
    }

    fn stop(&mut self) {}
}

struct SyntheticCamera {
    level: u8,
    count: u32,
}

impl CameraDevice for SyntheticCamera {
    fn profile(&self) -> CameraProfile {
        CameraProfile {
            width: 8,
            height: 6,
            fps: 20.0,
        }
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        thread::sleep(Duration::from_millis(2));
        self.count += 1;
        let level = self.level.wrapping_add((self.count % 8) as u8);
        Ok(Frame::from_rgb(8, 6, vec![level; 8 * 6 * 3]))
    }
}

struct FakeBackend {
    window: SampleWindow,
}

impl DeviceBackend for FakeBackend {
    fn open_audio(&self, _settings: &AudioSettings) -> Result<Box<dyn AudioIntake>> {
        Ok(Box::new(FakeAudio {
            window: self.window.clone(),
        }))
    }

    fn open_camera(&self, settings: &CameraSettings) -> Result<Box<dyn CameraDevice>> {
        Ok(Box::new(SyntheticCamera {
            level: if settings.index == 0 { 40 } else { 200 },
            count: 0,
        }))
    }
}

/// Fails to open audio a fixed number of times, counting every attempt.
struct FlakyBackend {
    window: SampleWindow,
    failures_left: AtomicU32,
    attempts: Arc<AtomicU32>,
}

impl DeviceBackend for FlakyBackend {
    fn open_audio(&self, _settings: &AudioSettings) -> Result<Box<dyn AudioIntake>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            bail!("microphone busy");
        }
        Ok(Box::new(FakeAudio {
            window: self.window.clone(),
        }))
    }

    fn open_camera(&self, settings: &CameraSettings) -> Result<Box<dyn CameraDevice>> {
        FakeBackend {
            window: self.window.clone(),
        }
        .open_camera(settings)
    }
}

#[derive(Default)]
struct CountingWindow {
    frames: usize,
}

impl DisplayWindow for CountingWindow {
    fn show(&mut self, frame: &Frame) {
        assert_eq!((frame.width(), frame.height()), (8, 6));
        self.frames += 1;
    }
}

fn config(clips_dir: &Path) -> PipelineConfig {
    let camera = |name: &str, index| CameraSettings {
        name: name.to_string(),
        index,
        width: 8,
        height: 6,
        fps: 20,
    };
    PipelineConfig {
        audio: AudioSettings::default(),
        detector: DetectorConfig {
            threshold_db: 75.0,
            min_interval: Duration::from_secs(5),
            tick_interval: Duration::from_millis(20),
        },
        cameras: [camera("front", 0), camera("back", 1)],
        capture: CaptureSettings {
            fps: 20,
            seconds_to_record: 1,
            post_event: Duration::from_millis(200),
            clips_dir: clips_dir.to_path_buf(),
            playback_speed: 4.0,
            jpeg_quality: 80,
            rotate_180: true,
        },
    }
}

fn clip_files(dir: &Path) -> Vec<PathBuf> {
    let mut clips: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok().map(|entry| entry.path()))
                .filter(|path| path.extension().is_some_and(|ext| ext == "clip"))
                .collect()
        })
        .unwrap_or_default();
    clips.sort();
    clips
}

#[test]
fn loud_sound_saves_and_replays_both_streams() {
    let dir = scratch_dir("strike");
    let window = SampleWindow::with_capacity(100);
    let backend = FakeBackend {
        window: window.clone(),
    };
    let mut pipeline = Pipeline::start(&config(&dir), &backend).expect("pipeline starts");

    // Let both ring buffers fill before the strike.
    thread::sleep(Duration::from_millis(150));
    window.push(&[0.5f32; 100]);
    thread::sleep(Duration::from_millis(60));
    window.push(&[0.0f32; 100]);

    let mut front = CountingWindow::default();
    let mut back = CountingWindow::default();
    let deadline = Instant::now() + Duration::from_secs(10);
    while (front.frames < 3 || back.frames < 3) && Instant::now() < deadline {
        let mut windows: [&mut dyn DisplayWindow; 2] = [&mut front, &mut back];
        assert!(!pipeline.poll_displays(&mut windows));
        thread::sleep(Duration::from_millis(2));
    }
    assert!(front.frames >= 3, "front replayed {} frames", front.frames);
    assert!(back.frames >= 3, "back replayed {} frames", back.frames);

    let clips = clip_files(&dir);
    assert_eq!(clips.len(), 2, "{clips:?}");
    let names: Vec<String> = clips
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert!(names.iter().any(|name| name.starts_with("back ")));
    assert!(names.iter().any(|name| name.starts_with("front ")));
    for clip in &clips {
        let reader = ClipReader::open(clip).unwrap();
        assert_eq!(reader.header().frame_count, 20);
        assert_eq!(reader.header().fps, 20.0);
    }

    let started = Instant::now();
    pipeline.shutdown();
    assert!(started.elapsed() < Duration::from_secs(3));
    pipeline.shutdown();
}

#[test]
fn silence_saves_nothing() {
    let dir = scratch_dir("silence");
    let window = SampleWindow::with_capacity(100);
    let backend = FakeBackend {
        window: window.clone(),
    };
    let pipeline = Pipeline::start(&config(&dir), &backend).expect("pipeline starts");
    window.push(&[0.0f32; 100]);
    thread::sleep(Duration::from_millis(400));
    drop(pipeline);
    assert!(clip_files(&dir).is_empty());
}

#[test]
fn restart_recovers_from_transient_device_failure() {
    let dir = scratch_dir("flaky");
    let attempts = Arc::new(AtomicU32::new(0));
    let backend = FlakyBackend {
        window: SampleWindow::with_capacity(100),
        failures_left: AtomicU32::new(2),
        attempts: attempts.clone(),
    };
    let policy = RetryPolicy {
        max_attempts: 4,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
    };
    let cfg = config(&dir);
    let pipeline = run_with_retry(&policy, |_| Pipeline::start(&cfg, &backend));
    assert!(pipeline.is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[test]
fn restart_gives_up_when_devices_never_open() {
    let dir = scratch_dir("dead");
    let attempts = Arc::new(AtomicU32::new(0));
    let backend = FlakyBackend {
        window: SampleWindow::with_capacity(100),
        failures_left: AtomicU32::new(u32::MAX),
        attempts: attempts.clone(),
    };
    let policy = RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::ZERO,
        max_backoff: Duration::ZERO,
    };
    let cfg = config(&dir);
    let err = match run_with_retry(&policy, |_| Pipeline::start(&cfg, &backend)) {
        Ok(_) => panic!("pipeline should not start"),
        Err(err) => err,
    };
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(format!("{err:#}").contains("microphone busy"));
}
