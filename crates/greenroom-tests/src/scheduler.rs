//! Integration tests for the render loop.
//!
//! Drives `CompositorSession` through its lifecycle with scripted sources
//! and backends.

use crate::mock::MockBackend;
use greenroom_compositor::{
    CompositorSession, ParameterController, PrimingPolicy, RefreshOutcome, SessionState,
};
use greenroom_core::{ChromaKeyParams, GreenroomError, VideoFrame};
use greenroom_keyer::{CpuKeyer, RenderBackend};
use greenroom_source::ScriptedSource;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ── Helpers ────────────────────────────────────────────────────

fn frame(w: u32, h: u32, index: u64) -> VideoFrame {
    VideoFrame::solid(w, h, [0, 255, 0, 255], Duration::from_millis(index * 33))
}

fn run(session: &mut CompositorSession<impl RenderBackend>, refreshes: usize) {
    for _ in 0..refreshes {
        session.on_refresh().unwrap();
    }
}

fn mock_session() -> (CompositorSession<MockBackend>, crate::mock::MockHandle) {
    let (backend, handle) = MockBackend::new();
    (
        CompositorSession::new(backend, ParameterController::default()),
        handle,
    )
}

// ── Resize ─────────────────────────────────────────────────────

#[test]
fn resize_reallocates_exactly_once() {
    let mut session = CompositorSession::new(CpuKeyer::new(), ParameterController::default());
    let frames = (0..3)
        .map(|i| Some(frame(640, 480, i)))
        .chain((3..6).map(|i| Some(frame(1280, 720, i))));
    session.attach_source(ScriptedSource::new(frames)).unwrap();

    run(&mut session, 6);

    assert_eq!(session.backend().allocations(), 2);
    assert_eq!(session.stats().reallocations, 1);
    assert_eq!(session.output_extent(), Some((1280, 720)));
    let out = session.backend().presented().unwrap();
    assert_eq!((out.width, out.height), (1280, 720));
    assert_eq!(out.data.len(), 1280 * 720 * 4);
}

#[test]
fn same_size_frames_reuse_the_surface() {
    let (mut session, _handle) = mock_session();
    session
        .attach_source(ScriptedSource::new((0..10).map(|i| Some(frame(320, 240, i)))))
        .unwrap();
    run(&mut session, 10);
    assert_eq!(session.backend().allocations(), 1);
    assert_eq!(session.stats().reallocations, 0);
    assert_eq!(session.stats().uploaded_frames, 10);
}

// ── Teardown ───────────────────────────────────────────────────

#[test]
fn teardown_stops_all_work() {
    let (mut session, handle) = mock_session();
    session
        .attach_source(ScriptedSource::new((0..5).map(|i| Some(frame(8, 8, i)))))
        .unwrap();
    run(&mut session, 2);

    session.teardown();
    let presents = handle.log().presents;
    session.teardown();
    run(&mut session, 3);

    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(handle.log().presents, presents);
    assert_eq!(handle.log().uploads, 2);
    drop(session);
    assert_eq!(handle.log().releases, 1);
}

#[test]
fn dropping_a_session_releases_the_backend() {
    let (mut session, handle) = mock_session();
    session.attach_source(ScriptedSource::new([None])).unwrap();
    drop(session);
    assert_eq!(handle.log().releases, 1);
}

// ── Parameters ─────────────────────────────────────────────────

#[test]
fn parameter_change_is_used_by_the_next_render() {
    let (mut session, handle) = mock_session();
    let params = session.params().clone();
    session
        .attach_source(ScriptedSource::new((0..4).map(|i| Some(frame(8, 8, i)))))
        .unwrap();
    run(&mut session, 1);

    let blue = ChromaKeyParams::blue_screen();
    params.set_parameters(blue);
    run(&mut session, 1);

    assert_eq!(handle.log().rendered.last(), Some(&blue));
}

#[test]
fn parameter_change_rerenders_a_still_frame() {
    let (mut session, handle) = mock_session();
    let params = session.params().clone();
    session
        .attach_source(ScriptedSource::new([Some(frame(8, 8, 0))]))
        .unwrap();
    run(&mut session, 3);
    assert_eq!(handle.log().rendered.len(), 1);

    params.update(|p| p.similarity = 0.2);
    assert_eq!(session.on_refresh().unwrap(), RefreshOutcome::Rendered);
    assert_eq!(handle.log().rendered.len(), 2);
    assert_eq!(handle.log().rendered[1].similarity, 0.2);
    assert_eq!(session.on_refresh().unwrap(), RefreshOutcome::Presented);
}

#[test]
fn writes_from_another_thread_are_observed() {
    let (mut session, handle) = mock_session();
    let params = session.params().clone();
    session
        .attach_source(ScriptedSource::new([Some(frame(8, 8, 0))]))
        .unwrap();
    run(&mut session, 1);

    std::thread::spawn(move || params.update(|p| p.bypass = true))
        .join()
        .unwrap();
    run(&mut session, 1);
    assert!(handle.log().rendered.last().unwrap().bypass);
}

// ── Failures ───────────────────────────────────────────────────

#[test]
fn shader_compile_failure_stops_the_session() {
    let (backend, handle) = MockBackend::with_shader("@fragment fn fs_main( {");
    let mut session = CompositorSession::new(backend, ParameterController::default());

    let err = session
        .attach_source(ScriptedSource::new([Some(frame(8, 8, 0))]))
        .unwrap_err();
    assert!(matches!(err, GreenroomError::PipelineInit(_)));
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(handle.log().releases, 1);
    assert_eq!(session.on_refresh().unwrap(), RefreshOutcome::Inactive);
    assert_eq!(handle.log().uploads, 0);
}

#[test]
fn context_loss_is_surfaced_once() {
    let (mut session, handle) = mock_session();
    session
        .attach_source(ScriptedSource::new((0..10).map(|i| Some(frame(8, 8, i)))))
        .unwrap();
    run(&mut session, 3);

    handle.lose_context("device reset");
    let err = session.on_refresh().unwrap_err();
    assert!(matches!(err, GreenroomError::ContextLost(ref r) if r == "device reset"));
    assert_eq!(session.state(), SessionState::Stopped);

    for _ in 0..3 {
        assert_eq!(session.on_refresh().unwrap(), RefreshOutcome::Inactive);
    }
    assert_eq!(handle.log().rendered.len(), 3);
    assert_eq!(handle.log().releases, 1);
}

#[test]
fn failed_render_keeps_presenting_and_retries() {
    let (mut session, handle) = mock_session();
    session
        .attach_source(ScriptedSource::new([Some(frame(8, 8, 0)), Some(frame(8, 8, 1))]))
        .unwrap();
    run(&mut session, 1);

    handle.fail_next_renders(1);
    assert_eq!(session.on_refresh().unwrap(), RefreshOutcome::Presented);
    assert_eq!(session.stats().failed_renders, 1);
    assert_eq!(handle.log().presents, 2);

    assert_eq!(session.on_refresh().unwrap(), RefreshOutcome::Rendered);
    assert_eq!(session.state(), SessionState::Running);
}

#[test]
fn failed_upload_is_counted_and_skipped() {
    let (mut session, handle) = mock_session();
    session
        .attach_source(ScriptedSource::new((0..3).map(|i| Some(frame(8, 8, i)))))
        .unwrap();
    run(&mut session, 1);

    handle.fail_next_uploads(1);
    assert_eq!(session.on_refresh().unwrap(), RefreshOutcome::Presented);
    assert_eq!(session.on_refresh().unwrap(), RefreshOutcome::Rendered);
    assert_eq!(session.stats().failed_uploads, 1);
    assert_eq!(session.stats().uploaded_frames, 2);
}

// ── Priming ────────────────────────────────────────────────────

#[test]
fn priming_waits_through_gaps() {
    let (mut session, _handle) = mock_session();
    let fired = Arc::new(AtomicU32::new(0));
    let counter = fired.clone();
    session.on_first_frame(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let script = (0..5)
        .map(|_| None)
        .chain((0..5).map(|i| Some(frame(16, 9, i))));
    session.attach_source(ScriptedSource::new(script)).unwrap();

    for attempt in 1..=5 {
        assert_eq!(
            session.on_refresh().unwrap(),
            RefreshOutcome::Priming { attempt }
        );
    }
    assert_eq!(session.on_refresh().unwrap(), RefreshOutcome::FirstFrame);
    run(&mut session, 4);

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    let first = session.first_frame().unwrap();
    assert_eq!((first.width, first.height), (16, 9));
    assert_eq!(first.pts, Duration::ZERO);
}

#[test]
fn priming_exhaustion_is_pipeline_init() {
    let (backend, handle) = MockBackend::new();
    let mut session = CompositorSession::new(backend, ParameterController::default())
        .with_priming(PrimingPolicy { max_refreshes: 4 });
    session.on_first_frame(|_| panic!("no frame should reach the screen"));
    session.attach_source(ScriptedSource::new([None])).unwrap();

    run(&mut session, 3);
    assert!(matches!(
        session.on_refresh(),
        Err(GreenroomError::PipelineInit(_))
    ));
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(handle.log().presents, 0);
    assert_eq!(handle.log().releases, 1);
}
