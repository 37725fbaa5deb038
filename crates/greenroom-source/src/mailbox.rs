//! Lossy frame mailbox between a producer thread and the render loop.
//!
//! Live video favors latency over completeness: when the consumer falls
//! behind, the oldest undelivered frame is dropped in favor of the newest.

use crate::source::FrameSource;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use greenroom_core::VideoFrame;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// What happened to a pushed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Queued without displacing anything.
    Queued,
    /// Queued after dropping the oldest undelivered frame.
    ReplacedOldest,
    /// Dropped because its timestamp does not advance the stream.
    Stale,
    /// The receiving side is gone.
    Closed,
}

/// How the receiver picks among queued frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryPolicy {
    /// Skip to the newest queued frame.
    #[default]
    Latest,
    /// Deliver queued frames one per poll.
    Fifo,
}

#[derive(Debug, Default)]
struct MailboxStats {
    pushed: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
}

/// Counters shared by both ends of a mailbox.
#[derive(Debug, Clone)]
pub struct MailboxCounters(Arc<MailboxStats>);

impl MailboxCounters {
    /// Frames accepted by `push`.
    pub fn pushed(&self) -> u64 {
        self.0.pushed.load(Ordering::Relaxed)
    }

    /// Frames discarded for staleness, overflow or skipping.
    pub fn dropped(&self) -> u64 {
        self.0.dropped.load(Ordering::Relaxed)
    }

    /// Frames handed to the render loop.
    pub fn delivered(&self) -> u64 {
        self.0.delivered.load(Ordering::Relaxed)
    }
}

/// Producer half. Cheap to clone; clones share ordering state.
#[derive(Clone)]
pub struct FrameSender {
    tx: Sender<VideoFrame>,
    // Lets the producer evict the oldest entry when the queue is full.
    evict: Receiver<VideoFrame>,
    last_pts: Arc<Mutex<Option<Duration>>>,
    closed: Arc<AtomicBool>,
    stats: Arc<MailboxStats>,
}

/// Consumer half, used as the compositor's [`FrameSource`].
pub struct FrameReceiver {
    rx: Receiver<VideoFrame>,
    policy: DeliveryPolicy,
    wait: Option<Duration>,
    ended: bool,
    closed: Arc<AtomicBool>,
    stats: Arc<MailboxStats>,
}

/// Create a mailbox holding at most `capacity` undelivered frames.
pub fn frame_channel(capacity: usize) -> (FrameSender, FrameReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    let stats = Arc::new(MailboxStats::default());
    let closed = Arc::new(AtomicBool::new(false));
    let sender = FrameSender {
        tx,
        evict: rx.clone(),
        last_pts: Arc::new(Mutex::new(None)),
        closed: closed.clone(),
        stats: stats.clone(),
    };
    let receiver = FrameReceiver {
        rx,
        policy: DeliveryPolicy::default(),
        wait: None,
        ended: false,
        closed,
        stats,
    };
    (sender, receiver)
}

impl FrameSender {
    /// Offer a frame to the render loop without blocking.
    pub fn push(&self, frame: VideoFrame) -> PushOutcome {
        if self.closed.load(Ordering::Acquire) {
            return PushOutcome::Closed;
        }

        // Held across the send so concurrent producers cannot interleave
        // timestamps out of order.
        let mut last = self.last_pts.lock();
        if let Some(prev) = *last {
            if frame.pts <= prev {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(pts = ?frame.pts, last = ?prev, "Dropping stale frame");
                return PushOutcome::Stale;
            }
        }
        let pts = frame.pts;

        let mut outcome = PushOutcome::Queued;
        let mut pending = frame;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => break,
                Err(TrySendError::Full(f)) => {
                    if self.evict.try_recv().is_ok() {
                        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                        outcome = PushOutcome::ReplacedOldest;
                    }
                    pending = f;
                }
                Err(TrySendError::Disconnected(_)) => return PushOutcome::Closed,
            }
        }

        *last = Some(pts);
        self.stats.pushed.fetch_add(1, Ordering::Relaxed);
        outcome
    }

    /// Shared counters.
    pub fn counters(&self) -> MailboxCounters {
        MailboxCounters(self.stats.clone())
    }

    /// Whether the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl FrameReceiver {
    /// Choose how queued frames are delivered.
    pub fn with_policy(mut self, policy: DeliveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Wait up to `wait` for a frame when none is queued. Keep this at or
    /// below one refresh interval.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = Some(wait);
        self
    }

    /// Shared counters.
    pub fn counters(&self) -> MailboxCounters {
        MailboxCounters(self.stats.clone())
    }

    fn take_one(&mut self) -> Option<VideoFrame> {
        let first = match self.wait {
            Some(wait) => match self.rx.recv_timeout(wait) {
                Ok(frame) => Ok(frame),
                Err(RecvTimeoutError::Timeout) => Err(TryRecvError::Empty),
                Err(RecvTimeoutError::Disconnected) => Err(TryRecvError::Disconnected),
            },
            None => self.rx.try_recv(),
        };
        match first {
            Ok(frame) => Some(frame),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                info!("Frame source ended");
                self.ended = true;
                None
            }
        }
    }
}

impl FrameSource for FrameReceiver {
    fn next_frame(&mut self) -> Option<VideoFrame> {
        if self.ended {
            return None;
        }
        let mut frame = self.take_one()?;
        if self.policy == DeliveryPolicy::Latest {
            while let Ok(newer) = self.rx.try_recv() {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                frame = newer;
            }
        }
        self.stats.delivered.fetch_add(1, Ordering::Relaxed);
        Some(frame)
    }

    fn is_ended(&self) -> bool {
        self.ended
    }
}

impl Drop for FrameReceiver {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}
