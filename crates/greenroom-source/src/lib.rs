//! Greenroom Source - live frames for the compositor
//!
//! This crate handles:
//! - The frame source contract polled by the render loop
//! - A lossy mailbox between a producer thread and the loop
//! - Synthetic and scripted sources for demos and tests

pub mod mailbox;
pub mod source;
pub mod synthetic;

pub use mailbox::{
    frame_channel, DeliveryPolicy, FrameReceiver, FrameSender, MailboxCounters, PushOutcome,
};
pub use source::{FrameSource, ScriptedSource};
pub use synthetic::{spawn_producer, Pattern, SyntheticSource};
