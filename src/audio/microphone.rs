//! System microphone intake via CPAL.
//!
//! The CPAL stream lives on its own thread for its whole life; the callback
//! downmixes every block to mono and pushes it into the shared
//! [`SampleWindow`].

use super::dispatch::append_downmixed_samples;
use super::window::SampleWindow;
use super::DEFAULT_WINDOW_MS;
use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam_channel::{bounded, Sender};
use std::thread;
use std::time::Duration;

/// A running audio source feeding a [`SampleWindow`].
pub trait AudioIntake: Send {
    fn device_name(&self) -> &str;
    fn sample_rate(&self) -> u32;
    fn window(&self) -> SampleWindow;
    /// Stop delivering samples. Safe to call more than once.
    fn stop(&mut self);
}

#[derive(Debug, Clone)]
pub struct AudioSettings {
    pub preferred_device: Option<String>,
    pub window: Duration,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            preferred_device: None,
            window: Duration::from_millis(DEFAULT_WINDOW_MS),
        }
    }
}

/// Input device wrapper that keeps the CPAL stream alive on a dedicated thread.
pub struct Microphone {
    device_name: String,
    sample_rate: u32,
    window: SampleWindow,
    stop_tx: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

struct OpenedInput {
    device_name: String,
    sample_rate: u32,
    window: SampleWindow,
}

impl Microphone {
    /// List microphone names so the CLI can expose a human-friendly selector.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Open the preferred (or default) input device and start streaming.
    ///
    /// Returns once the stream is playing, or with the device error.
    pub fn open(settings: &AudioSettings) -> Result<Self> {
        let (ready_tx, ready_rx) = bounded::<Result<OpenedInput>>(1);
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let preferred = settings.preferred_device.clone();
        let window_len = settings.window;

        let handle = thread::Builder::new()
            .name("strikecam-audio".to_string())
            .spawn(move || {
                let (stream, opened) = match start_input_stream(preferred.as_deref(), window_len) {
                    Ok(started) => started,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if ready_tx.send(Ok(opened)).is_err() {
                    return;
                }
                // Park until stop is requested or the handle is dropped.
                let _ = stop_rx.recv();
                if let Err(err) = stream.pause() {
                    tracing::debug!("failed to pause audio stream: {err}");
                }
                drop(stream);
            })
            .context("failed to spawn audio intake thread")?;

        let opened = match ready_rx.recv() {
            Ok(result) => result,
            Err(_) => Err(anyhow!("audio intake thread exited during start-up")),
        };
        let opened = match opened {
            Ok(opened) => opened,
            Err(err) => {
                let _ = handle.join();
                return Err(err);
            }
        };

        tracing::info!(
            device = %opened.device_name,
            sample_rate = opened.sample_rate,
            window_samples = opened.window.capacity(),
            "recording audio"
        );
        Ok(Self {
            device_name: opened.device_name,
            sample_rate: opened.sample_rate,
            window: opened.window,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }
}

impl AudioIntake for Microphone {
    fn device_name(&self) -> &str {
        &self.device_name
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn window(&self) -> SampleWindow {
        self.window.clone()
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("audio intake thread panicked");
            }
        }
    }
}

impl Drop for Microphone {
    fn drop(&mut self) {
        self.stop();
    }
}

fn start_input_stream(
    preferred_device: Option<&str>,
    window_len: Duration,
) -> Result<(cpal::Stream, OpenedInput)> {
    let host = cpal::default_host();
    let device = match preferred_device {
        Some(name) => {
            let mut devices = host.input_devices().context("no input devices available")?;
            devices
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| anyhow!("input device '{name}' not found"))?
        }
        None => host
            .default_input_device()
            .context("no default input device available")?,
    };
    let device_name = device
        .name()
        .unwrap_or_else(|_| "Unknown Device".to_string());

    let default_config = device
        .default_input_config()
        .with_context(|| format!("no usable input config for '{device_name}'"))?;
    let format = default_config.sample_format();
    let device_config: StreamConfig = default_config.into();
    let sample_rate = device_config.sample_rate.0;
    let channels = usize::from(device_config.channels.max(1));
    tracing::debug!(
        "input config: format={format:?} sample_rate={sample_rate}Hz channels={channels}"
    );

    let window = SampleWindow::for_duration(sample_rate, window_len);
    let err_fn = |err| tracing::warn!("audio stream error: {err}");

    let stream = match format {
        SampleFormat::F32 => {
            let window = window.clone();
            let mut scratch = Vec::new();
            device.build_input_stream(
                &device_config,
                move |data: &[f32], _| {
                    scratch.clear();
                    append_downmixed_samples(&mut scratch, data, channels, |sample| sample);
                    window.push(&scratch);
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::I16 => {
            let window = window.clone();
            let mut scratch = Vec::new();
            device.build_input_stream(
                &device_config,
                move |data: &[i16], _| {
                    scratch.clear();
                    append_downmixed_samples(&mut scratch, data, channels, |sample| {
                        sample as f32 / 32_768.0
                    });
                    window.push(&scratch);
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::U16 => {
            let window = window.clone();
            let mut scratch = Vec::new();
            device.build_input_stream(
                &device_config,
                move |data: &[u16], _| {
                    scratch.clear();
                    append_downmixed_samples(&mut scratch, data, channels, |sample| {
                        (sample as f32 - 32_768.0) / 32_768.0
                    });
                    window.push(&scratch);
                },
                err_fn,
                None,
            )?
        }
        other => return Err(anyhow!("unsupported sample format: {other:?}")),
    };
    stream
        .play()
        .with_context(|| format!("failed to start audio stream on '{device_name}'"))?;

    Ok((
        stream,
        OpenedInput {
            device_name,
            sample_rate,
            window,
        },
    ))
}
