//! Wires the detector to both capture streams and owns the display surfaces.

mod devices;
mod supervisor;
#[cfg(test)]
mod tests;
mod trigger;

pub use devices::{DeviceBackend, NativeDevices};
pub use supervisor::{run_with_retry, RetryPolicy};
pub use trigger::save_delay;

use crate::audio::{
    spawn_detector, AudioIntake, AudioSettings, Detection, DetectorConfig, DetectorHandle,
};
use crate::video::{
    CameraSettings, CaptureSettings, CaptureStream, DisplaySurface, DisplayWindow, SaveTrigger,
    StreamState, SurfacePoll,
};
use anyhow::{Context, Result};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::thread;

/// Everything a pipeline instance needs to start.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub audio: AudioSettings,
    pub detector: DetectorConfig,
    /// Front and back camera, in that order.
    pub cameras: [CameraSettings; 2],
    pub capture: CaptureSettings,
}

pub struct Pipeline {
    audio: Option<Box<dyn AudioIntake>>,
    detector: Option<DetectorHandle>,
    dispatcher: Option<thread::JoinHandle<()>>,
    // Dropping this cancels the dispatcher and any waiting triggers.
    shutdown_tx: Option<Sender<()>>,
    streams: Vec<CaptureStream>,
    surfaces: Vec<DisplaySurface>,
}

impl Pipeline {
    /// Open all devices, then start capture and detection.
    ///
    /// Any device failure aborts start-up; whatever was already opened is
    /// released before the error is returned.
    pub fn start(config: &PipelineConfig, backend: &dyn DeviceBackend) -> Result<Self> {
        let mut audio = backend
            .open_audio(&config.audio)
            .context("error initializing audio")?;
        let window = audio.window();
        tracing::debug!(
            device = audio.device_name(),
            sample_rate = audio.sample_rate(),
            window_samples = window.capacity(),
            "audio intake ready"
        );
        let mut cameras = Vec::with_capacity(config.cameras.len());
        for settings in &config.cameras {
            match backend.open_camera(settings) {
                Ok(camera) => cameras.push(camera),
                Err(err) => {
                    audio.stop();
                    return Err(err)
                        .with_context(|| format!("error initializing {} video", settings.name));
                }
            }
        }

        let surfaces: Vec<DisplaySurface> = config
            .cameras
            .iter()
            .map(|settings| DisplaySurface::new(settings.name.clone()))
            .collect();

        let mut pipeline = Self {
            audio: Some(audio),
            detector: None,
            dispatcher: None,
            shutdown_tx: None,
            streams: Vec::with_capacity(cameras.len()),
            surfaces,
        };

        for ((settings, camera), surface) in config
            .cameras
            .iter()
            .zip(cameras)
            .zip(pipeline.surfaces.iter().map(DisplaySurface::intake).collect::<Vec<_>>())
        {
            let stream = CaptureStream::start(&settings.name, &config.capture, camera, surface)?;
            pipeline.streams.push(stream);
        }

        let triggers: Vec<SaveTrigger> = pipeline
            .streams
            .iter()
            .map(CaptureStream::save_trigger)
            .collect();
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let (detection_tx, detection_rx) = bounded::<Detection>(0);
        pipeline.shutdown_tx = Some(shutdown_tx);
        pipeline.dispatcher = Some(
            thread::Builder::new()
                .name("strikecam-dispatch".to_string())
                .spawn(move || dispatch_detections(detection_rx, shutdown_rx, triggers))
                .context("failed to spawn detection dispatcher")?,
        );

        pipeline.detector = Some(spawn_detector(
            window,
            config.detector.clone(),
            detection_tx,
        )?);

        tracing::info!(
            streams = pipeline.streams.len(),
            frames_per_clip = config.capture.buffer_capacity(),
            "pipeline started"
        );
        Ok(pipeline)
    }

    pub fn surfaces(&self) -> &[DisplaySurface] {
        &self.surfaces
    }

    pub fn stream_states(&self) -> Vec<(String, StreamState)> {
        self.streams
            .iter()
            .map(|stream| (stream.name().to_string(), stream.state()))
            .collect()
    }

    /// Poll every surface against its window, in camera order. Call from the
    /// rendering thread. Returns `true` if any window asked to quit.
    pub fn poll_displays(&mut self, windows: &mut [&mut dyn DisplayWindow]) -> bool {
        let mut quit = false;
        for (surface, window) in self.surfaces.iter_mut().zip(windows.iter_mut()) {
            if surface.poll(&mut **window) == SurfacePoll::Quit {
                quit = true;
            }
        }
        quit
    }

    /// Stop detection, dispatch, capture and audio, in that order. Safe to
    /// call more than once.
    pub fn shutdown(&mut self) {
        let was_running = self.audio.is_some();
        if let Some(mut detector) = self.detector.take() {
            detector.stop();
        }
        drop(self.shutdown_tx.take());
        if let Some(dispatcher) = self.dispatcher.take() {
            if dispatcher.join().is_err() {
                tracing::error!("detection dispatcher panicked");
            }
        }
        for stream in &mut self.streams {
            stream.stop();
        }
        if let Some(mut audio) = self.audio.take() {
            audio.stop();
        }
        if was_running {
            tracing::info!("pipeline stopped");
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Fan each detection out to one delayed trigger per stream.
fn dispatch_detections(
    detections: Receiver<Detection>,
    shutdown: Receiver<()>,
    triggers: Vec<SaveTrigger>,
) {
    loop {
        let detection = select! {
            recv(detections) -> msg => match msg {
                Ok(detection) => detection,
                Err(_) => break,
            },
            recv(shutdown) -> _ => break,
        };
        for save in &triggers {
            let save = save.clone();
            let cancel = shutdown.clone();
            let spawned = thread::Builder::new()
                .name(format!("strikecam-trigger-{}", save.stream()))
                .spawn(move || trigger::fire_after(&save, &detection, &cancel));
            if let Err(err) = spawned {
                tracing::warn!("failed to spawn save trigger: {err}");
            }
        }
    }
    tracing::debug!("detection dispatcher stopped");
}
