use super::loudness::loudness_db;
use crate::lock::{read_or_recover, write_or_recover};
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Rolling window over the most recent mono samples.
///
/// The audio callback is the only writer; the detector tick reads it. Cloning
/// shares the same window.
#[derive(Clone, Debug)]
pub struct SampleWindow {
    inner: Arc<RwLock<WindowState>>,
}

#[derive(Debug)]
struct WindowState {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl SampleWindow {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(RwLock::new(WindowState {
                samples: VecDeque::with_capacity(capacity),
                capacity,
            })),
        }
    }

    /// Size a window to hold `length` of audio at `sample_rate`.
    pub fn for_duration(sample_rate: u32, length: Duration) -> Self {
        let samples = (u128::from(sample_rate) * length.as_millis() / 1000) as usize;
        Self::with_capacity(samples)
    }

    pub fn capacity(&self) -> usize {
        read_or_recover(&self.inner, "sample window capacity").capacity
    }

    pub fn len(&self) -> usize {
        read_or_recover(&self.inner, "sample window len").samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append samples, dropping the oldest ones beyond capacity.
    pub fn push(&self, samples: &[f32]) {
        let mut state = write_or_recover(&self.inner, "sample window push");
        let capacity = state.capacity;
        // Only the tail can survive when a block is larger than the window.
        let tail = &samples[samples.len().saturating_sub(capacity)..];
        let overflow = (state.samples.len() + tail.len()).saturating_sub(capacity);
        state.samples.drain(..overflow);
        state.samples.extend(tail.iter().copied());
    }

    /// Loudness of the current window; the read lock is released on return.
    pub fn loudness_db(&self) -> f64 {
        let state = read_or_recover(&self.inner, "sample window loudness");
        loudness_db(state.samples.iter())
    }
}
