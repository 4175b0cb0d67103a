//! Delayed save triggers.
//!
//! A detection marks the strike; each stream saves once `post_event` of video
//! has been captured after it, so the clip brackets the strike.

use crate::audio::Detection;
use crate::video::SaveTrigger;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

/// Remaining wait before saving, or `None` when the post-event window has
/// already passed.
pub fn save_delay(post_event: Duration, elapsed: Duration) -> Option<Duration> {
    post_event
        .checked_sub(elapsed)
        .filter(|delay| !delay.is_zero())
}

/// Wait out the post-event window, then ask `trigger` to save.
///
/// Returns without saving if `cancel` fires or disconnects while waiting.
pub(super) fn fire_after(trigger: &SaveTrigger, detection: &Detection, cancel: &Receiver<()>) {
    let elapsed = Instant::now().saturating_duration_since(detection.occurred_at);
    match save_delay(trigger.post_event(), elapsed) {
        Some(delay) => match cancel.recv_timeout(delay) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        },
        None => tracing::warn!(
            "{}: detection is {} ms old; clip will miss part of the post-event window",
            trigger.stream(),
            elapsed.as_millis()
        ),
    }
    if !trigger.request_save() {
        tracing::debug!("{}: save request not queued", trigger.stream());
    }
}
