//! Integration tests for keyed output.
//!
//! Runs real frames through the CPU keyer inside a session and checks what
//! ends up on screen.

use greenroom_compositor::{CompositorSession, ParameterController, RefreshOutcome};
use greenroom_core::{ChromaKeyParams, PixelFormat, VideoFrame};
use greenroom_keyer::{CpuKeyer, KeyedImage, RenderBackend};
use greenroom_source::{frame_channel, spawn_producer, Pattern, ScriptedSource, SyntheticSource};
use std::time::Duration;

const GREEN: [u8; 4] = [0, 255, 0, 255];
const RED: [u8; 4] = [255, 0, 0, 255];

/// Left half key green, right half pure red.
fn split_frame(width: u32, height: u32) -> VideoFrame {
    let mut frame = VideoFrame::solid(width, height, GREEN, Duration::ZERO);
    for y in 0..height {
        let row = frame.row_mut(y);
        for x in width / 2..width {
            let i = (x * 4) as usize;
            row[i..i + 4].copy_from_slice(&RED);
        }
    }
    frame
}

fn keyed(frame: VideoFrame, params: ChromaKeyParams) -> KeyedImage {
    let mut session = CompositorSession::new(CpuKeyer::new(), ParameterController::new(params));
    session
        .attach_source(ScriptedSource::new([Some(frame)]))
        .unwrap();
    assert_eq!(session.on_refresh().unwrap(), RefreshOutcome::FirstFrame);
    session.backend().snapshot().unwrap()
}

#[test]
fn green_becomes_transparent_and_red_is_untouched() {
    let params = ChromaKeyParams {
        key_color: [0.0, 1.0, 0.0],
        similarity: 0.4,
        smoothness: 0.08,
        spill: 0.15,
        ..Default::default()
    };
    let out = keyed(split_frame(64, 32), params);

    for y in 0..32 {
        for x in 0..32 {
            assert_eq!(out.pixel(x, y)[3], 0, "green at ({x}, {y}) still visible");
        }
        for x in 32..64 {
            assert_eq!(out.pixel(x, y), RED, "red at ({x}, {y}) changed");
        }
    }
}

#[test]
fn bypass_shows_the_raw_frame() {
    let out = keyed(
        split_frame(16, 8),
        ChromaKeyParams {
            bypass: true,
            ..Default::default()
        },
    );
    assert_eq!(out.pixel(0, 0), GREEN);
    assert_eq!(out.pixel(15, 7), RED);
}

#[test]
fn bgra_frames_are_keyed_like_rgba() {
    let mut frame = VideoFrame::new(4, 2, PixelFormat::Bgra8, Duration::ZERO);
    for y in 0..2 {
        let row = frame.row_mut(y);
        for px in row.chunks_exact_mut(4) {
            px.copy_from_slice(&[0, 0, 255, 255]);
        }
    }
    let out = keyed(frame, ChromaKeyParams::default());
    assert_eq!(out.pixel(1, 1), RED);
}

#[test]
fn presenter_backdrop_is_removed() {
    let source = SyntheticSource::new(Pattern::GREEN_SCREEN_PRESENTER, 96, 64);
    let frame = source.render(0);
    let out = keyed(frame, ChromaKeyParams::green_screen());

    assert_eq!(out.pixel(0, 0)[3], 0);
    assert_eq!(out.pixel(95, 63)[3], 0);
    assert_eq!(out.pixel(48, 35)[3], 255);
}

#[test]
fn live_producer_reaches_the_screen() {
    let (sender, receiver) = frame_channel(2);
    let source = SyntheticSource::new(Pattern::GREEN_SCREEN_PRESENTER, 64, 36)
        .with_frame_rate(120)
        .with_limit(20);
    let producer = spawn_producer(source, sender).unwrap();

    let mut session = CompositorSession::new(CpuKeyer::new(), ParameterController::default());
    session
        .attach_source(receiver.with_wait(Duration::from_millis(50)))
        .unwrap();

    let mut first_frame_seen = false;
    for _ in 0..100 {
        if session.on_refresh().unwrap() == RefreshOutcome::FirstFrame {
            first_frame_seen = true;
        }
        if session.source_ended() {
            break;
        }
    }

    assert!(first_frame_seen);
    assert!(session.source_ended());
    assert_eq!(session.output_extent(), Some((64, 36)));
    assert!(session.stats().rendered_frames >= 1);
    assert_eq!(producer.join().unwrap(), 20);
}
