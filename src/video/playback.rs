//! Looping slow-motion replay of a saved clip into a display surface.

use super::clip::{ClipError, ClipRead, ClipReader};
use super::display::FrameSender;
use anyhow::{Context, Result};
use crossbeam_channel::{bounded, select, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Default replay speed: quarter speed.
pub const DEFAULT_PLAYBACK_SPEED: f64 = 0.25;

/// Delay between frames for a clip captured at `fps` replayed at `speed`
/// (0.5 is half speed, 2.0 double speed).
pub fn frame_delay(fps: f64, speed: f64) -> Duration {
    if !(fps.is_finite() && fps > 0.0 && speed.is_finite() && speed > 0.0) {
        return Duration::from_millis(33);
    }
    Duration::from_secs_f64(1.0 / fps / speed)
}

/// One running replay. Dropping it cancels the replay.
pub struct ClipPlayback {
    stream: String,
    clip: PathBuf,
    frame_delay: Duration,
    cancel_tx: Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ClipPlayback {
    /// Open `clip` and start replaying it into `surface`.
    ///
    /// The clip is opened before the thread starts, so an unreadable clip is
    /// reported here and no playback runs.
    pub fn start(stream: &str, clip: &Path, speed: f64, surface: FrameSender) -> Result<Self> {
        let reader = ClipReader::open(clip)
            .with_context(|| format!("error opening clip {}", clip.display()))?;
        let delay = frame_delay(reader.header().fps, speed);
        let (cancel_tx, cancel_rx) = bounded::<()>(1);

        let worker = PlaybackWorker {
            stream: stream.to_string(),
            clip: clip.to_path_buf(),
            delay,
            surface,
            cancel_rx,
        };
        let handle = thread::Builder::new()
            .name(format!("strikecam-playback-{stream}"))
            .spawn(move || worker.run(reader))
            .context("failed to spawn playback thread")?;

        tracing::info!(
            stream,
            "replaying {} at {:.2}x ({} ms per frame)",
            clip.display(),
            speed,
            delay.as_millis()
        );
        Ok(Self {
            stream: stream.to_string(),
            clip: clip.to_path_buf(),
            frame_delay: delay,
            cancel_tx,
            handle: Some(handle),
        })
    }

    pub fn clip(&self) -> &Path {
        &self.clip
    }

    pub fn frame_delay(&self) -> Duration {
        self.frame_delay
    }

    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true)
    }

    /// Stop the replay and wait for its thread. No frame reaches the surface
    /// after this returns.
    pub fn cancel(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        tracing::debug!("stopping {} video playback", self.stream);
        let _ = self.cancel_tx.try_send(());
        if handle.join().is_err() {
            tracing::error!("{} playback thread panicked", self.stream);
        }
    }
}

impl Drop for ClipPlayback {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct PlaybackWorker {
    stream: String,
    clip: PathBuf,
    delay: Duration,
    surface: FrameSender,
    cancel_rx: Receiver<()>,
}

impl PlaybackWorker {
    fn cancelled(&self) -> bool {
        !matches!(self.cancel_rx.try_recv(), Err(TryRecvError::Empty))
    }

    fn run(self, mut reader: ClipReader) {
        let mut shown_this_pass = 0usize;
        loop {
            let frame = match reader.next_frame() {
                Ok(ClipRead::Frame(frame)) => frame,
                Ok(ClipRead::Skipped) => {
                    if self.cancelled() {
                        break;
                    }
                    continue;
                }
                Ok(ClipRead::End) => {
                    if shown_this_pass == 0 {
                        tracing::warn!("{}: clip has no playable frames", self.stream);
                        break;
                    }
                    tracing::debug!("restarting {} video playback", self.stream);
                    shown_this_pass = 0;
                    reader = match self.reopen() {
                        Ok(reader) => reader,
                        Err(err) => {
                            tracing::warn!("{}: {err}", self.stream);
                            break;
                        }
                    };
                    continue;
                }
                Err(err) => {
                    tracing::warn!("{}: clip read failed: {err}", self.stream);
                    break;
                }
            };

            if self.cancelled() {
                break;
            }
            select! {
                send(self.surface, frame) -> res => {
                    if res.is_err() {
                        break;
                    }
                }
                recv(self.cancel_rx) -> _ => break,
            }
            shown_this_pass += 1;

            match self.cancel_rx.recv_timeout(self.delay) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        tracing::info!("{} video playback stopped", self.stream);
    }

    fn reopen(&self) -> Result<ClipReader, ClipError> {
        ClipReader::open(&self.clip)
    }
}
