//! Integration tests for hosting several sessions at once.

use crate::mock::MockBackend;
use greenroom_compositor::{Compositor, CompositorConfig, SessionEvent, SessionState};
use greenroom_core::{ChromaKeyParams, GreenroomError, VideoFrame};
use greenroom_keyer::CpuKeyer;
use greenroom_source::ScriptedSource;
use std::time::Duration;

fn frames(n: u64, w: u32, h: u32) -> ScriptedSource {
    ScriptedSource::new((0..n).map(move |i| {
        Some(VideoFrame::solid(w, h, [0, 255, 0, 255], Duration::from_millis(i * 33)))
    }))
}

#[test]
fn context_loss_in_one_session_spares_the_other() {
    let mut compositor = Compositor::new(CompositorConfig::default());
    let (mock, handle) = MockBackend::new();
    let remote = compositor.create_session(Box::new(mock));
    let preview = compositor.create_session(Box::new(CpuKeyer::new()));
    compositor.attach_source(remote, frames(10, 32, 18)).unwrap();
    compositor.attach_source(preview, frames(10, 64, 36)).unwrap();

    assert_eq!(compositor.tick().len(), 2);
    compositor.tick();

    handle.lose_context("adapter removed");
    let events = compositor.tick();
    assert_eq!(events.len(), 1);
    match &events[0] {
        SessionEvent::Failed { session, error } => {
            assert_eq!(*session, remote);
            assert!(matches!(error, GreenroomError::ContextLost(_)));
        }
        other => panic!("unexpected event {other:?}"),
    }

    assert!(compositor.tick().is_empty());
    assert_eq!(compositor.state(remote), Some(SessionState::Stopped));
    assert_eq!(compositor.state(preview), Some(SessionState::Running));
    assert_eq!(compositor.stats(preview).unwrap().rendered_frames, 4);
    assert_eq!(handle.log().releases, 1);
}

#[test]
fn parameters_are_per_session() {
    let mut compositor = Compositor::new(CompositorConfig::default());
    let a = compositor.create_session(Box::new(CpuKeyer::new()));
    let b = compositor.create_session(Box::new(CpuKeyer::new()));

    compositor
        .params(a)
        .unwrap()
        .set_parameters(ChromaKeyParams::blue_screen());

    assert_eq!(
        compositor.params(a).unwrap().get_parameters(),
        ChromaKeyParams::blue_screen()
    );
    assert_eq!(
        compositor.params(b).unwrap().get_parameters(),
        ChromaKeyParams::green_screen()
    );
    assert_eq!(compositor.params(b).unwrap().version(), 0);
}

#[test]
fn output_sizes_follow_each_source() {
    let mut compositor = Compositor::new(CompositorConfig::default());
    let small = compositor.create_session(Box::new(CpuKeyer::new()));
    let large = compositor.create_session(Box::new(CpuKeyer::new()));
    compositor.attach_source(small, frames(2, 32, 18)).unwrap();
    compositor.attach_source(large, frames(2, 128, 72)).unwrap();

    let mut sizes: Vec<_> = compositor
        .tick()
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::FirstFrame(first) => Some((first.session, first.width, first.height)),
            SessionEvent::Failed { .. } => None,
        })
        .collect();
    sizes.sort_by_key(|&(_, w, _)| w);
    assert_eq!(sizes, vec![(small, 32, 18), (large, 128, 72)]);
}

#[test]
fn teardown_of_one_session_leaves_the_rest_running() {
    let mut compositor = Compositor::new(CompositorConfig::default());
    let (mock, handle) = MockBackend::new();
    let gone = compositor.create_session(Box::new(mock));
    let kept = compositor.create_session(Box::new(CpuKeyer::new()));
    compositor.attach_source(gone, frames(5, 8, 8)).unwrap();
    compositor.attach_source(kept, frames(5, 8, 8)).unwrap();
    compositor.tick();

    assert!(compositor.teardown(gone));
    assert!(!compositor.teardown(gone));
    assert_eq!(handle.log().releases, 1);

    compositor.tick();
    assert_eq!(compositor.len(), 1);
    assert_eq!(compositor.stats(kept).unwrap().rendered_frames, 2);
    assert_eq!(handle.log().presents, 1);
}

#[test]
fn dropping_the_compositor_releases_every_session() {
    let (first, first_handle) = MockBackend::new();
    let (second, second_handle) = MockBackend::new();
    {
        let mut compositor = Compositor::new(CompositorConfig::default());
        compositor.create_session(Box::new(first));
        let id = compositor.create_session(Box::new(second));
        compositor.attach_source(id, frames(1, 4, 4)).unwrap();
        compositor.tick();
    }
    assert_eq!(first_handle.log().releases, 1);
    assert_eq!(second_handle.log().releases, 1);
}
