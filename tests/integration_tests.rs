//! Integration tests for the render surface
//!
//! These tests drive complete frames through `FrameProducer` against the
//! simulated buffer queue, sink and composition backend, and check what
//! each collaborator observed.

use std::sync::Arc;

use render_surface::composition::DisplayId;
use render_surface::config::{DisplayConfig, GeneralConfig};
use render_surface::frame::{EscalationLog, FrameOutcome};
use render_surface::observer::{RecordingObserver, SurfaceEvent};
use render_surface::sim::{CompositionPattern, SimCompositionBackend, SimDisplay, SlotState};
use render_surface::{CompositionType, FrameState, QueueOutcome, SurfaceError};

fn general() -> GeneralConfig {
    GeneralConfig {
        frames: 8,
        debug: false,
        acquire_timeout_ms: 10,
    }
}

struct Harness {
    display: SimDisplay,
    backend: Arc<SimCompositionBackend>,
    observer: Arc<RecordingObserver>,
    escalations: EscalationLog,
}

fn harness(config: &DisplayConfig) -> Harness {
    let backend = Arc::new(SimCompositionBackend::new());
    let observer = Arc::new(RecordingObserver::new());
    let escalations = EscalationLog::new();
    let display = SimDisplay::build(
        config,
        &general(),
        backend.clone(),
        observer.clone(),
        Box::new(escalations.clone()),
    );
    Harness {
        display,
        backend,
        observer,
        escalations,
    }
}

fn gpu_panel() -> DisplayConfig {
    let mut config = DisplayConfig::physical("internal", 7, 1920, 1080);
    config.composition = CompositionPattern::Gpu;
    config
}

/// A single GPU-only frame on a 1920x1080 panel is presented and flipped
#[test]
fn test_gpu_only_frame_on_primary() {
    let mut h = harness(&gpu_panel());

    let report = h.display.producer_mut().run_frame(true).unwrap();
    assert_eq!(report.composition, Some(CompositionType::GpuOnly));
    assert_eq!(report.page_flip_count, 1);
    let FrameOutcome::Completed(QueueOutcome::Presented(id)) = report.outcome else {
        panic!("expected a presented frame, got {:?}", report.outcome);
    };

    let surface = h.display.surface();
    assert_eq!(surface.page_flip_count(), 1);
    assert!(!surface.has_in_flight_buffer());
    assert_eq!(surface.frame_state(), FrameState::Idle);

    let queue = h.display.queue().stats();
    assert_eq!(queue.queued, vec![id]);
    assert_eq!(h.display.queue().current(), Some(id));
    assert!(queue.ready_fence_signals.iter().all(|s| s.is_some()));

    let sink = h.display.sink().stats();
    assert_eq!(sink.compositions, vec![CompositionType::GpuOnly]);
    assert_eq!(sink.recompositions, 1);
    assert_eq!(sink.advanced, 1);
    assert_eq!(sink.committed, 1);

    let viewports = h.display.engine().viewports();
    assert_eq!(viewports.len(), 1);
    assert_eq!((viewports[0].width, viewports[0].height), (1920, 1080));
    assert_eq!(viewports[0].source_crop.right, 1920);
    assert_eq!(viewports[0].source_crop.bottom, 1080);

    assert_eq!(h.backend.prepare_count(DisplayId(7)), 1);
    assert!(h.escalations.is_empty());
}

#[test]
fn test_flip_count_tracks_frames() {
    let mut h = harness(&gpu_panel());
    let summary = h.display.run(24);

    assert_eq!(summary.flips, 24);
    assert_eq!(summary.tally.frames, 24);
    assert_eq!(summary.tally.presented, 24);
    assert_eq!(summary.draws, 24);
    assert_eq!(summary.bytes_drawn, 24 * 1920 * 1080 * 4);
    assert_eq!(summary.late_acquires, 0);
    assert_eq!(summary.queue.queued.len(), 24);
    assert!(summary.fatal.is_none());
    assert_eq!(h.observer.count(|e| e.is_error()), 0);
}

#[test]
fn test_gpu_only_virtual_display_skips_prepare() {
    let mut h = harness(&DisplayConfig::virtual_display("recording", 1280, 720));
    let summary = h.display.run(6);

    assert_eq!(summary.tally.presented, 6);
    assert_eq!(summary.flips, 6);
    assert!(summary
        .sink
        .compositions
        .iter()
        .all(|c| *c == CompositionType::GpuOnly));
    assert_eq!(h.backend.prepare_count(DisplayId(0)), 0);
}

#[test]
fn test_virtual_queue_failure_cancels_buffer() {
    let mut config = DisplayConfig::virtual_display("recording", 1280, 720);
    config.faults.fail_queue_every = Some(2);
    let mut h = harness(&config);

    let summary = h.display.run(4);

    assert!(summary.fatal.is_none());
    assert!(h.escalations.is_empty());
    assert_eq!(summary.tally.presented, 2);
    assert_eq!(summary.tally.cancelled, 2);
    assert_eq!(summary.flips, 4);
    assert_eq!(summary.queue.queue_failures, 2);
    assert_eq!(summary.queue.cancelled.len(), 2);
    assert_eq!(h.observer.count(|e| matches!(e, SurfaceEvent::Cancelled(_))), 2);
    assert_eq!(h.observer.count(|e| matches!(e, SurfaceEvent::Escalated(_))), 0);

    // Cancelled slots went back to the free pool
    assert!(!h
        .display
        .queue()
        .slot_states()
        .contains(&SlotState::Dequeued));
}

#[test]
fn test_primary_queue_failure_escalates() {
    let mut config = gpu_panel();
    config.faults.fail_queue_every = Some(3);
    let mut h = harness(&config);

    let summary = h.display.run(10);

    assert_eq!(summary.tally.frames, 2);
    assert_eq!(summary.flips, 2);
    assert!(summary.fatal.is_some());
    // The sink is not advanced for the failed frame
    assert_eq!(summary.sink.advanced, 2);

    let errors = h.escalations.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].is_fatal());
    assert!(matches!(
        &errors[0],
        SurfaceError::QueueFailedOnPrimary { display, .. } if display == "internal"
    ));

    let surface = h.display.surface();
    assert_eq!(surface.frame_state(), FrameState::Escalated);
    assert!(!surface.has_in_flight_buffer());

    // A stopped producer keeps refusing with the original error
    let again = h.display.producer_mut().run_frame(false).unwrap_err();
    assert_eq!(again.to_string(), errors[0].to_string());
    assert_eq!(h.escalations.errors().len(), 1);
    assert_eq!(h.display.surface().page_flip_count(), 2);
}

#[test]
fn test_flip_request_forces_scratch_dequeue() {
    let mut config = DisplayConfig::physical("internal", 3, 1920, 1080);
    config.composition = CompositionPattern::Hardware;
    config.faults.flip_client_target_every = Some(2);
    let mut h = harness(&config);

    let summary = h.display.run(4);

    assert_eq!(summary.tally.not_required, 2);
    assert_eq!(summary.tally.presented, 2);
    assert_eq!(summary.flips, 4);
    // Hardware frames never reach the renderer
    assert_eq!(summary.draws, 0);
    assert_eq!(summary.bytes_drawn, 0);
    assert!(h.display.engine().viewports().is_empty());
    assert_eq!(h.observer.count(|e| *e == SurfaceEvent::ScratchDequeue), 2);
    // Nothing was drawn so the hand-off carried no ready fence
    assert_eq!(summary.queue.ready_fence_signals, vec![None, None]);
    assert!(summary
        .sink
        .compositions
        .iter()
        .all(|c| *c == CompositionType::HardwareOnly));
}

#[test]
fn test_alternating_composition() {
    let mut config = DisplayConfig::physical("internal", 1, 1920, 1080);
    config.composition = CompositionPattern::Alternate;
    let mut h = harness(&config);

    let summary = h.display.run(6);

    assert_eq!(summary.tally.presented, 3);
    assert_eq!(summary.tally.not_required, 3);
    assert_eq!(summary.flips, 6);
    assert_eq!(
        summary.sink.compositions,
        vec![
            CompositionType::GpuOnly,
            CompositionType::HardwareOnly,
            CompositionType::GpuOnly,
            CompositionType::HardwareOnly,
            CompositionType::GpuOnly,
            CompositionType::HardwareOnly,
        ]
    );
}

#[test]
fn test_dequeue_failures_yield_no_buffer() {
    let mut config = DisplayConfig::virtual_display("recording", 640, 480);
    config.faults.fail_dequeue_every = Some(1);
    let mut h = harness(&config);

    let summary = h.display.run(3);

    assert_eq!(summary.tally.no_buffer, 3);
    assert_eq!(summary.flips, 3);
    assert_eq!(summary.draws, 0);
    assert!(summary.queue.queued.is_empty());
    // The frame's dequeue plus the scratch attempt inside queue
    assert_eq!(summary.queue.dequeue_failures, 6);
    assert_eq!(h.observer.count(|e| *e == SurfaceEvent::NoBufferReady), 3);
}

#[test]
fn test_prepare_failure_skips_frame() {
    let mut config = gpu_panel();
    config.faults.fail_prepare_every = Some(2);
    let mut h = harness(&config);

    let summary = h.display.run(4);

    assert_eq!(summary.tally.frames, 4);
    assert_eq!(summary.tally.prepare_failed, 2);
    assert_eq!(summary.tally.presented, 2);
    assert_eq!(summary.flips, 2);
    assert_eq!(summary.sink.frames_begun, 4);
    assert_eq!(summary.sink.advanced, 2);
    assert_eq!(summary.queue.dequeues, 2);
    assert_eq!(h.observer.count(|e| matches!(e, SurfaceEvent::PrepareFailed(_))), 2);
}

#[test]
fn test_advance_failure_is_reported_not_fatal() {
    let mut config = gpu_panel();
    config.faults.fail_advance_every = Some(1);
    let mut h = harness(&config);

    let summary = h.display.run(3);

    assert!(summary.fatal.is_none());
    assert_eq!(summary.tally.presented, 3);
    assert_eq!(summary.sink.advance_failures, 3);
    assert_eq!(
        h.observer.count(|e| matches!(e, SurfaceEvent::AdvanceFrameFailed(_))),
        3
    );
}

#[test]
fn test_rejected_usage_keeps_protected_off() {
    let mut config = gpu_panel();
    config.protected = true;
    config.faults.fail_usage = true;
    let mut h = harness(&config);

    assert!(!h.display.surface().is_protected());
    // Once from initialize, once from the protected switch
    assert_eq!(
        h.observer.count(|e| matches!(e, SurfaceEvent::UsageRejected { .. })),
        2
    );

    let summary = h.display.run(2);
    assert!(!summary.protected);
    assert_eq!(summary.tally.presented, 2);
}

#[test]
fn test_protected_display() {
    let mut config = gpu_panel();
    config.protected = true;
    let h = harness(&config);

    assert!(h.display.surface().is_protected());
    assert!(h
        .display
        .queue()
        .usage()
        .contains(render_surface::BufferUsage::PROTECTED));
}

#[test]
fn test_dump_describes_surface_and_sink() {
    let mut h = harness(&gpu_panel());
    let summary = h.display.run(2);

    assert!(summary
        .dump
        .starts_with("   Composition RenderSurface State:\n   size=[1920 1080] NativeWindow=0x"));
    assert!(summary.dump.contains("(format 1) flips=2 \n"));
    assert!(summary.dump.contains("   SimDisplaySurface: "));
}

/// Displays are independent and can be driven from their own threads
#[tokio::test]
async fn test_displays_run_concurrently() -> anyhow::Result<()> {
    let backend = Arc::new(SimCompositionBackend::new());
    let observer = Arc::new(RecordingObserver::new());

    let configs = vec![
        gpu_panel(),
        DisplayConfig::physical("external", 8, 3840, 2160),
        DisplayConfig::virtual_display("recording", 1280, 720),
    ];

    let mut tasks = Vec::new();
    for config in configs {
        let backend = backend.clone();
        let observer = observer.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            let mut display = SimDisplay::build(
                &config,
                &general(),
                backend,
                observer,
                Box::new(EscalationLog::new()),
            );
            display.run(16)
        }));
    }

    for task in tasks {
        let summary = task.await?;
        assert_eq!(summary.flips, 16, "{}", summary);
        assert!(summary.fatal.is_none());
    }

    assert_eq!(backend.prepare_count(DisplayId(7)), 16);
    assert_eq!(backend.prepare_count(DisplayId(8)), 16);
    assert_eq!(observer.count(|e| e.is_error()), 0);
    Ok(())
}
