//! Dual-camera capture, clip persistence and slow-motion replay.

mod camera;
mod capture;
mod clip;
mod display;
mod frame;
mod playback;
mod ring_buffer;

pub use camera::{list_cameras, CameraDevice, CameraProfile, CameraSettings, NativeCamera};
pub use capture::{CaptureSettings, CaptureStream, SaveTrigger, StreamState};
pub use clip::{
    clip_path, ClipError, ClipHeader, ClipInfo, ClipMeta, ClipRead, ClipReader, ClipWriter,
    CLIP_EXTENSION, DEFAULT_JPEG_QUALITY,
};
pub use display::{DisplaySurface, DisplayWindow, FrameSender, SurfacePoll};
pub use frame::Frame;
pub use playback::{frame_delay, ClipPlayback, DEFAULT_PLAYBACK_SPEED};
pub use ring_buffer::{ClipSnapshot, RingFrameBuffer, SaveError};
