//! The frame source contract.

use greenroom_core::VideoFrame;

/// A live stream of decoded frames.
///
/// `next_frame` must return promptly: either immediately or after a wait no
/// longer than one display refresh. `None` means "nothing new yet"; the
/// render loop retries on the next refresh. Frames come out in presentation
/// timestamp order, but a source may skip frames to stay current.
///
/// Once the upstream ends or fails, every later call returns `None`. That is
/// not an error for the compositor, which keeps presenting its last output.
pub trait FrameSource: Send {
    /// Take the next available frame, if any.
    fn next_frame(&mut self) -> Option<VideoFrame>;

    /// Whether the upstream has ended for good.
    fn is_ended(&self) -> bool {
        false
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Option<VideoFrame> {
        (**self).next_frame()
    }

    fn is_ended(&self) -> bool {
        (**self).is_ended()
    }
}

/// A source replaying a fixed list of frames, one per call.
///
/// `None` entries model refreshes where nothing new arrived.
pub struct ScriptedSource {
    frames: std::collections::VecDeque<Option<VideoFrame>>,
}

impl ScriptedSource {
    pub fn new(frames: impl IntoIterator<Item = Option<VideoFrame>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Option<VideoFrame> {
        self.frames.pop_front().flatten()
    }

    fn is_ended(&self) -> bool {
        self.frames.is_empty()
    }
}
