//! Deterministic frame generator.
//!
//! Stands in for a live camera or call track: the demo host feeds it through
//! a mailbox, tests poll it directly.

use crate::mailbox::{FrameSender, PushOutcome};
use crate::source::FrameSource;
use greenroom_core::VideoFrame;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info};

/// What each generated frame shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pattern {
    /// Every pixel the same RGBA color.
    Solid([u8; 4]),
    /// Eight vertical color bars.
    ColorBars,
    /// A subject disc over a key-colored backdrop, with a ring of spill
    /// where the two meet. The disc drifts horizontally over time.
    Presenter { backdrop: [u8; 4], subject: [u8; 4] },
}

impl Pattern {
    /// A warm subject in front of a pure green screen.
    pub const GREEN_SCREEN_PRESENTER: Self = Self::Presenter {
        backdrop: [0, 255, 0, 255],
        subject: [224, 172, 140, 255],
    };
}

/// Generates frames on demand at a nominal frame rate.
pub struct SyntheticSource {
    pattern: Pattern,
    width: u32,
    height: u32,
    frame_interval: Duration,
    produced: u64,
    limit: Option<u64>,
    resize: Option<(u64, u32, u32)>,
}

impl SyntheticSource {
    /// Create a 30 fps source.
    pub fn new(pattern: Pattern, width: u32, height: u32) -> Self {
        Self {
            pattern,
            width,
            height,
            frame_interval: Duration::from_secs(1) / 30,
            produced: 0,
            limit: None,
            resize: None,
        }
    }

    /// Nominal frame rate, used for timestamps.
    pub fn with_frame_rate(mut self, fps: u32) -> Self {
        self.frame_interval = Duration::from_secs(1) / fps.max(1);
        self
    }

    /// End the stream after `frames` frames.
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    /// Switch to `width`x`height` once `frames` frames have been produced.
    pub fn resize_after(mut self, frames: u64, width: u32, height: u32) -> Self {
        self.resize = Some((frames, width, height));
        self
    }

    /// Frames produced so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// Nominal interval between frames.
    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    fn dimensions_for(&self, index: u64) -> (u32, u32) {
        match self.resize {
            Some((after, w, h)) if index >= after => (w, h),
            _ => (self.width, self.height),
        }
    }

    /// Render frame number `index`.
    pub fn render(&self, index: u64) -> VideoFrame {
        let (width, height) = self.dimensions_for(index);
        let pts = self.frame_interval * index as u32;
        match self.pattern {
            Pattern::Solid(rgba) => VideoFrame::solid(width, height, rgba, pts),
            Pattern::ColorBars => VideoFrame::test_pattern(width, height, pts),
            Pattern::Presenter { backdrop, subject } => {
                let mut frame = VideoFrame::solid(width, height, backdrop, pts);
                let radius = width.min(height) as f32 * 0.3;
                let travel = width as f32 * 0.2;
                let phase = (index % 120) as f32 / 120.0 * std::f32::consts::TAU;
                let cx = width as f32 * 0.5 + travel * phase.sin();
                let cy = height as f32 * 0.55;
                let spill = mix(subject, backdrop, 0.35);
                for y in 0..height {
                    let row = frame.row_mut(y);
                    for x in 0..width {
                        let dx = x as f32 + 0.5 - cx;
                        let dy = y as f32 + 0.5 - cy;
                        let d = (dx * dx + dy * dy).sqrt();
                        let color = if d < radius - 2.0 {
                            subject
                        } else if d < radius {
                            spill
                        } else {
                            continue;
                        };
                        let i = (x * 4) as usize;
                        row[i..i + 4].copy_from_slice(&color);
                    }
                }
                frame
            }
        }
    }
}

fn mix(a: [u8; 4], b: [u8; 4], t: f32) -> [u8; 4] {
    std::array::from_fn(|c| (a[c] as f32 * (1.0 - t) + b[c] as f32 * t).round() as u8)
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Option<VideoFrame> {
        if self.is_ended() {
            return None;
        }
        let frame = self.render(self.produced);
        self.produced += 1;
        Some(frame)
    }

    fn is_ended(&self) -> bool {
        self.limit.is_some_and(|limit| self.produced >= limit)
    }
}

/// Push frames from `source` into `sender` in real time on a new thread.
///
/// The thread stops when the source ends or the receiver goes away and
/// returns the number of frames it pushed.
pub fn spawn_producer(
    mut source: SyntheticSource,
    sender: FrameSender,
) -> std::io::Result<JoinHandle<u64>> {
    std::thread::Builder::new()
        .name("greenroom-producer".into())
        .spawn(move || {
            let interval = source.frame_interval();
            let mut pushed = 0u64;
            while let Some(frame) = source.next_frame() {
                match sender.push(frame) {
                    PushOutcome::Closed => {
                        debug!("Receiver gone, stopping producer");
                        break;
                    }
                    PushOutcome::Stale => {}
                    PushOutcome::Queued | PushOutcome::ReplacedOldest => pushed += 1,
                }
                std::thread::sleep(interval);
            }
            info!(pushed, "Producer finished");
            pushed
        })
}
