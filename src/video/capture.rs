//! Per-camera capture loop.
//!
//! Each stream runs two threads:
//! - capture loop: pulls frames into the ring buffer and reacts to stop/save
//! - clip worker: writes snapshots to disk and owns the stream's playback,
//!   so saves are serialised and capture keeps running while a clip is written

use super::camera::{CameraDevice, CameraProfile};
use super::clip::{clip_path, ClipMeta, DEFAULT_JPEG_QUALITY};
use super::display::FrameSender;
use super::playback::{ClipPlayback, DEFAULT_PLAYBACK_SPEED};
use super::ring_buffer::{ClipSnapshot, RingFrameBuffer};
use anyhow::{Context, Result};
use chrono::Local;
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Capture tuning shared by both streams.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Frames per second the ring buffer is sized for.
    pub fps: u32,
    pub seconds_to_record: u32,
    /// Video kept after the strike; the rest of the window is before it.
    pub post_event: Duration,
    pub clips_dir: PathBuf,
    pub playback_speed: f64,
    pub jpeg_quality: u8,
    pub rotate_180: bool,
}

impl CaptureSettings {
    /// `N = seconds_to_record × fps`
    pub fn buffer_capacity(&self) -> usize {
        (self.fps as usize).saturating_mul(self.seconds_to_record as usize)
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            fps: 120,
            seconds_to_record: 4,
            post_event: Duration::from_secs(2),
            clips_dir: PathBuf::from("videos"),
            playback_speed: DEFAULT_PLAYBACK_SPEED,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            rotate_180: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Capturing,
    Stopped,
}

/// Cloneable handle that requests a save on one stream.
#[derive(Debug, Clone)]
pub struct SaveTrigger {
    stream: String,
    post_event: Duration,
    save_tx: Sender<()>,
}

impl SaveTrigger {
    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn post_event(&self) -> Duration {
        self.post_event
    }

    /// Ask for a save. Requests coalesce: returns `false` if one is already
    /// pending or the stream has stopped.
    pub fn request_save(&self) -> bool {
        match self.save_tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                tracing::debug!("{}: save already pending", self.stream);
                false
            }
            Err(TrySendError::Disconnected(())) => false,
        }
    }

    /// A trigger with no stream behind it; the receiver sees its requests.
    #[cfg(test)]
    pub(crate) fn detached(stream: &str, post_event: Duration) -> (Self, Receiver<()>) {
        let (save_tx, save_rx) = bounded(1);
        let trigger = Self {
            stream: stream.to_string(),
            post_event,
            save_tx,
        };
        (trigger, save_rx)
    }
}

pub struct CaptureStream {
    name: String,
    save: SaveTrigger,
    stop_tx: Sender<()>,
    capturing: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CaptureStream {
    /// Start capturing from `camera`; saved clips replay into `surface`.
    pub fn start(
        name: &str,
        settings: &CaptureSettings,
        camera: Box<dyn CameraDevice>,
        surface: FrameSender,
    ) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let (save_tx, save_rx) = bounded::<()>(1);
        let capturing = Arc::new(AtomicBool::new(true));

        let capture = CaptureLoop {
            name: name.to_string(),
            settings: settings.clone(),
            buffer: RingFrameBuffer::new(settings.buffer_capacity()),
            profile: camera.profile(),
            camera,
            stop_rx,
            save_rx,
            capturing: capturing.clone(),
        };
        let handle = thread::Builder::new()
            .name(format!("strikecam-capture-{name}"))
            .spawn(move || capture.run(surface))
            .with_context(|| format!("failed to spawn capture thread for {name}"))?;

        Ok(Self {
            name: name.to_string(),
            save: SaveTrigger {
                stream: name.to_string(),
                post_event: settings.post_event,
                save_tx,
            },
            stop_tx,
            capturing,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> StreamState {
        if self.capturing.load(Ordering::Acquire) {
            StreamState::Capturing
        } else {
            StreamState::Stopped
        }
    }

    pub fn save_trigger(&self) -> SaveTrigger {
        self.save.clone()
    }

    pub fn request_save(&self) -> bool {
        self.save.request_save()
    }

    /// Blocking rendezvous: returns once the loop has taken the stop request
    /// and its thread (and clip worker) have finished.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        // Fails only if the loop already exited on its own.
        let _ = self.stop_tx.send(());
        if handle.join().is_err() {
            tracing::error!("{} capture thread panicked", self.name);
        }
        self.capturing.store(false, Ordering::Release);
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.stop();
    }
}

struct CaptureLoop {
    name: String,
    settings: CaptureSettings,
    buffer: RingFrameBuffer,
    profile: CameraProfile,
    camera: Box<dyn CameraDevice>,
    stop_rx: Receiver<()>,
    save_rx: Receiver<()>,
    capturing: Arc<AtomicBool>,
}

struct ClipJob {
    snapshot: ClipSnapshot,
    destination: PathBuf,
    meta: ClipMeta,
}

impl CaptureLoop {
    fn run(mut self, surface: FrameSender) {
        tracing::info!(
            stream = %self.name,
            capacity = self.buffer.capacity(),
            "starting video capture"
        );
        let (job_tx, job_rx) = bounded::<ClipJob>(1);
        let worker = {
            let name = self.name.clone();
            let speed = self.settings.playback_speed;
            thread::Builder::new()
                .name(format!("strikecam-clips-{}", self.name))
                .spawn(move || run_clip_worker(&name, job_rx, surface, speed))
        };
        let worker = match worker {
            Ok(worker) => worker,
            Err(err) => {
                tracing::error!("{}: failed to spawn clip worker: {err}", self.name);
                self.capturing.store(false, Ordering::Release);
                return;
            }
        };

        loop {
            match self.stop_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }
            if self.save_rx.try_recv().is_ok() {
                self.handle_save(&job_tx);
                continue;
            }
            match self.camera.read_frame() {
                Ok(Some(frame)) => {
                    let frame = if self.settings.rotate_180 {
                        frame.rotated_180()
                    } else {
                        frame
                    };
                    self.buffer.append(frame);
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::error!("{}: camera read failed, stopping capture: {err:#}", self.name);
                    break;
                }
            }
        }

        self.capturing.store(false, Ordering::Release);
        drop(job_tx);
        if worker.join().is_err() {
            tracing::error!("{} clip worker panicked", self.name);
        }
        tracing::info!("video capture stopped for {}", self.name);
    }

    fn handle_save(&self, jobs: &Sender<ClipJob>) {
        let snapshot = match self.buffer.snapshot() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!("{}: not saving: {err}", self.name);
                return;
            }
        };
        let job = ClipJob {
            snapshot,
            destination: clip_path(&self.settings.clips_dir, &self.name, Local::now()),
            meta: ClipMeta {
                stream: self.name.clone(),
                width: self.profile.width,
                height: self.profile.height,
                fps: self.profile.fps,
                jpeg_quality: self.settings.jpeg_quality,
            },
        };
        match jobs.try_send(job) {
            Ok(()) => tracing::info!("saving video for {}", self.name),
            Err(TrySendError::Full(_)) => {
                tracing::warn!("{}: previous clip still being written; save skipped", self.name)
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!("{}: clip worker gone; save skipped", self.name)
            }
        }
    }
}

/// Serialises saves for one stream and owns its active playback.
fn run_clip_worker(name: &str, jobs: Receiver<ClipJob>, surface: FrameSender, speed: f64) {
    let mut active: Option<ClipPlayback> = None;
    for job in jobs.iter() {
        // The old replay must be gone before a new clip is written.
        if let Some(playback) = active.take() {
            playback.cancel();
        }
        let info = match job.snapshot.write_to(&job.destination, &job.meta) {
            Ok(info) => info,
            Err(err) => {
                tracing::warn!("{name}: error saving video: {err}");
                continue;
            }
        };
        tracing::info!(
            "{name}: saved {} frames to {}",
            info.frame_count,
            info.path.display()
        );
        match ClipPlayback::start(name, &info.path, speed, surface.clone()) {
            Ok(playback) => active = Some(playback),
            Err(err) => tracing::warn!("{name}: playback not started: {err:#}"),
        }
    }
    if let Some(playback) = active.take() {
        playback.cancel();
    }
}
