//! Fixed-capacity store of the most recent frames of one camera.

use super::clip::{ClipError, ClipInfo, ClipMeta, ClipWriter};
use super::frame::Frame;
use crate::lock::{read_or_recover, write_or_recover};
use std::path::Path;
use std::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("video frame buffer is not full ({filled}/{capacity})")]
    NotFull { filled: usize, capacity: usize },
    #[error(transparent)]
    Clip(#[from] ClipError),
}

/// Sliding window of the last `capacity` frames.
///
/// Slots are reused by index rotation: once full, the write cursor always
/// points at the oldest frame, which is released when it is overwritten.
/// The capture loop is the single writer; saves read through [`snapshot`].
///
/// [`snapshot`]: RingFrameBuffer::snapshot
pub struct RingFrameBuffer {
    state: RwLock<RingState>,
}

struct RingState {
    slots: Vec<Option<Frame>>,
    cursor: usize,
    filled: usize,
}

impl RingFrameBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: RwLock::new(RingState {
                slots: vec![None; capacity],
                cursor: 0,
                filled: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        read_or_recover(&self.state, "frame buffer capacity").slots.len()
    }

    pub fn len(&self) -> usize {
        read_or_recover(&self.state, "frame buffer len").filled
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        let state = read_or_recover(&self.state, "frame buffer is_full");
        state.filled == state.slots.len()
    }

    pub fn append(&self, frame: Frame) {
        let mut state = write_or_recover(&self.state, "frame buffer append");
        let capacity = state.slots.len();
        let cursor = state.cursor;
        let evicted = state.slots[cursor].replace(frame);
        drop(evicted);
        state.cursor = (cursor + 1) % capacity;
        state.filled = (state.filled + 1).min(capacity);
    }

    /// Copy out the frame handles in capture order.
    ///
    /// The read lock is held only for the O(capacity) handle clones, so
    /// appends are blocked for that long and never for encoding or disk I/O.
    pub fn snapshot(&self) -> Result<ClipSnapshot, SaveError> {
        let state = read_or_recover(&self.state, "frame buffer snapshot");
        let capacity = state.slots.len();
        if state.filled < capacity {
            return Err(SaveError::NotFull {
                filled: state.filled,
                capacity,
            });
        }
        let frames = (0..capacity)
            .filter_map(|offset| state.slots[(state.cursor + offset) % capacity].clone())
            .collect();
        Ok(ClipSnapshot { frames })
    }

    /// Persist all frames to `destination`. Nothing is written unless the
    /// buffer is full.
    pub fn save(&self, destination: &Path, meta: &ClipMeta) -> Result<ClipInfo, SaveError> {
        self.snapshot()?.write_to(destination, meta)
    }
}

/// Frames captured from a full buffer, oldest first.
#[derive(Debug, Clone)]
pub struct ClipSnapshot {
    frames: Vec<Frame>,
}

impl ClipSnapshot {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn write_to(&self, destination: &Path, meta: &ClipMeta) -> Result<ClipInfo, SaveError> {
        tracing::info!(
            stream = %meta.stream,
            frames = self.frames.len(),
            width = meta.width,
            height = meta.height,
            fps = meta.fps,
            "writing clip to {}",
            destination.display()
        );
        let mut writer = ClipWriter::create(destination, meta, self.frames.len() as u32)?;
        for (idx, frame) in self.frames.iter().enumerate() {
            writer.write_frame(frame).map_err(|err| {
                tracing::warn!("error writing frame ({idx}): {err}");
                err
            })?;
        }
        Ok(writer.finish()?)
    }
}
