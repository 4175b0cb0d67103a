use crate::audio::{AudioIntake, AudioSettings, Microphone};
use crate::video::{CameraDevice, CameraSettings, NativeCamera};
use anyhow::Result;

/// Opens the hardware a pipeline runs on.
pub trait DeviceBackend {
    fn open_audio(&self, settings: &AudioSettings) -> Result<Box<dyn AudioIntake>>;
    fn open_camera(&self, settings: &CameraSettings) -> Result<Box<dyn CameraDevice>>;
}

/// System microphone through CPAL, webcams through nokhwa.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeDevices;

impl DeviceBackend for NativeDevices {
    fn open_audio(&self, settings: &AudioSettings) -> Result<Box<dyn AudioIntake>> {
        Ok(Box::new(Microphone::open(settings)?))
    }

    fn open_camera(&self, settings: &CameraSettings) -> Result<Box<dyn CameraDevice>> {
        Ok(Box::new(NativeCamera::open(settings)?))
    }
}
