use image::RgbImage;
use std::sync::Arc;

/// A decoded RGB video frame.
///
/// Cloning shares the pixel data, so a save snapshot of the ring buffer only
/// bumps reference counts.
#[derive(Clone, Debug)]
pub struct Frame {
    image: Arc<RgbImage>,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    /// Wrap packed RGB8 pixels. Returns `None` if the length does not match
    /// the geometry.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, pixels).map(Self::new)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn as_rgb(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Cameras mounted upside down deliver frames that need a half turn.
    pub fn rotated_180(&self) -> Frame {
        Frame::new(image::imageops::rotate180(self.image.as_ref()))
    }
}
