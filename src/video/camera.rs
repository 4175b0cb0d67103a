//! Camera devices.
//!
//! [`NativeCamera`] drives a webcam through nokhwa on a reader thread and
//! exposes the latest decoded frames through a small channel, so the capture
//! loop can ask for "the next frame, or none if not ready" without blocking.

use super::frame::Frame;
use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use std::thread;
use std::time::Duration;

/// Decoded frames waiting for the capture loop. Older ones are dropped.
const FRAME_QUEUE_DEPTH: usize = 2;

/// Consecutive failed reads before the reader treats the camera as gone.
pub(crate) const MAX_READ_FAILURES: u32 = 30;

/// Requested camera set-up for one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    pub name: String,
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// What the device actually delivers after negotiation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraProfile {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

pub trait CameraDevice: Send {
    fn profile(&self) -> CameraProfile;

    /// Next decoded frame, or `None` when nothing is ready yet.
    ///
    /// Implementations may wait briefly but must not block indefinitely. An
    /// error means the device is gone and ends the stream.
    fn read_frame(&mut self) -> Result<Option<Frame>>;
}

/// List cameras as `(index, name)` pairs.
pub fn list_cameras() -> Result<Vec<(String, String)>> {
    let cameras = nokhwa::query(ApiBackend::Auto).context("failed to query cameras")?;
    Ok(cameras
        .into_iter()
        .map(|info| (info.index().to_string(), info.human_name()))
        .collect())
}

pub struct NativeCamera {
    profile: CameraProfile,
    frames: Receiver<Frame>,
    stop_tx: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
    poll_timeout: Duration,
}

impl NativeCamera {
    /// Open the camera, apply the requested geometry and start streaming.
    pub fn open(settings: &CameraSettings) -> Result<Self> {
        let (ready_tx, ready_rx) = bounded::<Result<CameraProfile>>(1);
        let (frame_tx, frame_rx) = bounded::<Frame>(FRAME_QUEUE_DEPTH);
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let thread_settings = settings.clone();

        let handle = thread::Builder::new()
            .name(format!("strikecam-camera-{}", settings.name))
            .spawn(move || {
                let mut camera = match open_device(&thread_settings) {
                    Ok(camera) => camera,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                let resolution = camera.resolution();
                let profile = CameraProfile {
                    width: resolution.width(),
                    height: resolution.height(),
                    fps: f64::from(camera.frame_rate()),
                };
                if ready_tx.send(Ok(profile)).is_err() {
                    return;
                }
                let name = thread_settings.name.as_str();
                let pause = read_retry_pause(profile.fps);
                pump_frames(|| grab_frame(&mut camera, name), &frame_tx, &stop_rx, name, pause);
                if let Err(err) = camera.stop_stream() {
                    tracing::debug!("{name}: failed to stop camera stream: {err}");
                }
            })
            .context("failed to spawn camera reader thread")?;

        let profile = match ready_rx.recv() {
            Ok(Ok(profile)) => profile,
            Ok(Err(err)) => {
                let _ = handle.join();
                return Err(err).with_context(|| {
                    format!(
                        "error opening {} camera ({})",
                        settings.name, settings.index
                    )
                });
            }
            Err(_) => {
                let _ = handle.join();
                return Err(anyhow!(
                    "camera reader for {} exited during start-up",
                    settings.name
                ));
            }
        };

        tracing::info!(
            camera = %settings.name,
            device = settings.index,
            "resolution {}x{} at {:.2} fps",
            profile.width,
            profile.height,
            profile.fps
        );
        let poll_timeout = frame_poll_timeout(profile.fps);
        Ok(Self {
            profile,
            frames: frame_rx,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
            poll_timeout,
        })
    }
}

impl CameraDevice for NativeCamera {
    fn profile(&self) -> CameraProfile {
        self.profile
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        match self.frames.recv_timeout(self.poll_timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(anyhow!("camera reader stopped")),
        }
    }
}

impl Drop for NativeCamera {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// A quarter of the frame period, so a missing frame costs the loop little.
pub(crate) fn frame_poll_timeout(fps: f64) -> Duration {
    if !fps.is_finite() || fps <= 0.0 {
        return Duration::from_millis(5);
    }
    Duration::from_secs_f64(1.0 / fps / 4.0)
        .clamp(Duration::from_millis(1), Duration::from_millis(20))
}

/// One frame period, used as the back-off after a failed device read.
pub(crate) fn read_retry_pause(fps: f64) -> Duration {
    if !fps.is_finite() || fps <= 0.0 {
        return Duration::from_millis(33);
    }
    Duration::from_secs_f64(1.0 / fps).clamp(Duration::from_millis(1), Duration::from_millis(100))
}

fn open_device(settings: &CameraSettings) -> Result<Camera> {
    let wanted = CameraFormat::new(
        Resolution::new(settings.width, settings.height),
        FrameFormat::MJPEG,
        settings.fps,
    );
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(wanted));
    let mut camera = Camera::new(CameraIndex::Index(settings.index), requested)
        .with_context(|| format!("failed to open camera {}", settings.index))?;
    if let Err(err) = camera.set_resolution(Resolution::new(settings.width, settings.height)) {
        tracing::debug!("{}: resolution request rejected: {err}", settings.name);
    }
    if let Err(err) = camera.set_frame_rate(settings.fps) {
        tracing::debug!("{}: frame rate request rejected: {err}", settings.name);
    }
    camera
        .open_stream()
        .with_context(|| format!("failed to start camera {}", settings.index))?;
    Ok(camera)
}

/// Read one frame from the device. `Ok(None)` means the buffer arrived but
/// could not be decoded.
fn grab_frame(camera: &mut Camera, name: &str) -> Result<Option<Frame>> {
    let buffer = camera.frame().context("camera read failed")?;
    let decoded = match buffer.decode_image::<RgbFormat>() {
        Ok(decoded) => decoded,
        Err(err) => {
            tracing::debug!("{name}: frame decode failed: {err}");
            return Ok(None);
        }
    };
    let (width, height) = (decoded.width(), decoded.height());
    Ok(Frame::from_rgb(width, height, decoded.into_raw()))
}

/// Feed frames from `grab` into `frames` until stopped.
///
/// A failed read pauses for `pause`. After [`MAX_READ_FAILURES`] failures in
/// a row the reader gives up; dropping `frames` then surfaces as a
/// disconnect in [`CameraDevice::read_frame`].
pub(super) fn pump_frames<F>(
    mut grab: F,
    frames: &Sender<Frame>,
    stop_rx: &Receiver<()>,
    name: &str,
    pause: Duration,
) where
    F: FnMut() -> Result<Option<Frame>>,
{
    let mut failures = 0u32;
    loop {
        match stop_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => return,
            Err(TryRecvError::Empty) => {}
        }
        let frame = match grab() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                failures = 0;
                continue;
            }
            Err(err) => {
                failures += 1;
                if failures >= MAX_READ_FAILURES {
                    tracing::error!("{name}: {failures} camera reads failed in a row: {err:#}");
                    return;
                }
                tracing::debug!("{name}: {err:#}");
                // Stop may arrive during the pause.
                match stop_rx.recv_timeout(pause) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                    Err(RecvTimeoutError::Timeout) => continue,
                }
            }
        };
        failures = 0;
        match frames.try_send(frame) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => return,
        }
    }
}
