use super::frame::Frame;
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

/// Sender half handed to playbacks.
pub type FrameSender = Sender<Frame>;

/// An on-screen target. Only ever called from the rendering thread.
pub trait DisplayWindow {
    fn show(&mut self, frame: &Frame);

    fn quit_requested(&mut self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfacePoll {
    Idle,
    Rendered,
    Quit,
}

/// Passive sink between a playback and the rendering thread.
///
/// The intake is unbuffered: a playback blocks until the renderer polls, so a
/// replay never runs ahead of what is on screen.
pub struct DisplaySurface {
    name: String,
    intake_tx: Sender<Frame>,
    intake_rx: Receiver<Frame>,
    current: Option<Frame>,
    rendered: u64,
}

impl DisplaySurface {
    pub fn new(name: impl Into<String>) -> Self {
        let (intake_tx, intake_rx) = bounded(0);
        Self {
            name: name.into(),
            intake_tx,
            intake_rx,
            current: None,
            rendered: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn intake(&self) -> FrameSender {
        self.intake_tx.clone()
    }

    /// The frame on screen, kept until the next one replaces it.
    pub fn current(&self) -> Option<&Frame> {
        self.current.as_ref()
    }

    pub fn rendered_frames(&self) -> u64 {
        self.rendered
    }

    /// Render a waiting frame, if any. Never blocks.
    pub fn poll(&mut self, window: &mut dyn DisplayWindow) -> SurfacePoll {
        let frame = match self.intake_rx.try_recv() {
            Ok(frame) => frame,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return SurfacePoll::Idle,
        };
        window.show(&frame);
        self.current = Some(frame);
        self.rendered += 1;
        if window.quit_requested() {
            SurfacePoll::Quit
        } else {
            SurfacePoll::Rendered
        }
    }
}
