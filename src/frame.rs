//! Frame producer: drives one render surface through complete frames
//!
//! The producer is the single writer for its surface. Every frame runs
//! begin, prepare, optional dequeue and render, queue, flip and present in
//! that order, and reconfiguration (`resize`, `set_protected`) can only
//! happen between frames because it needs `&mut self`.
//!
//! # Usage
//!
//! ```no_run
//! use render_surface::frame::{AbortOnFatal, FrameProducer};
//! # fn surface() -> render_surface::RenderSurface { unimplemented!() }
//!
//! let mut producer = FrameProducer::new(
//!     surface(),
//!     Box::new(|_: &render_surface::GraphicBuffer, _acquire: render_surface::Fence| {
//!         render_surface::Fence::signaled()
//!     }),
//!     Box::new(AbortOnFatal),
//! );
//! producer.initialize();
//! let report = producer.run_frame(true)?;
//! # Ok::<(), render_surface::SurfaceError>(())
//! ```

use log::{debug, error, info};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::buffer::{Dataspace, GraphicBuffer, Size};
use crate::composition::CompositionType;
use crate::error::SurfaceError;
use crate::fence::Fence;
use crate::status::{Status, StatusError};
use crate::surface::{QueueOutcome, RenderSurface};

/// Draws client composition into a dequeued buffer
pub trait FrameRenderer: Send {
    /// Renders into `buffer` once `acquire` fired; returns the fence that
    /// fires when the GPU finished writing
    fn render(&mut self, buffer: &GraphicBuffer, acquire: Fence) -> Fence;
}

impl<F> FrameRenderer for F
where
    F: FnMut(&GraphicBuffer, Fence) -> Fence + Send,
{
    fn render(&mut self, buffer: &GraphicBuffer, acquire: Fence) -> Fence {
        self(buffer, acquire)
    }
}

/// Turns a fatal surface error into process termination
pub trait EscalationHandler: Send {
    fn escalate(&mut self, error: &SurfaceError);
}

/// Production handler: logs and aborts the process
#[derive(Debug, Default, Clone, Copy)]
pub struct AbortOnFatal;

impl EscalationHandler for AbortOnFatal {
    fn escalate(&mut self, error: &SurfaceError) {
        error!("💥 Unrecoverable display failure, aborting: {}", error);
        std::process::abort();
    }
}

/// Records fatal errors instead of aborting; for tests and the simulator
#[derive(Debug, Default, Clone)]
pub struct EscalationLog {
    errors: Arc<Mutex<Vec<SurfaceError>>>,
}

impl EscalationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<SurfaceError> {
        self.errors.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }
}

impl EscalationHandler for EscalationLog {
    fn escalate(&mut self, error: &SurfaceError) {
        self.errors.lock().push(error.clone());
    }
}

/// How a frame ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Queue resolved; the frame was flipped and presented
    Completed(QueueOutcome),
    /// Hardware prepare failed; nothing was dequeued or queued
    PrepareFailed(StatusError),
}

/// Summary of one produced frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameReport {
    pub begin_status: Status,
    pub composition: Option<CompositionType>,
    pub outcome: FrameOutcome,
    pub page_flip_count: u64,
}

/// Per-display frame tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameTally {
    pub frames: u64,
    pub presented: u64,
    pub cancelled: u64,
    pub no_buffer: u64,
    pub not_required: u64,
    pub prepare_failed: u64,
}

impl FrameTally {
    pub fn record(&mut self, report: &FrameReport) {
        self.frames += 1;
        match report.outcome {
            FrameOutcome::Completed(QueueOutcome::Presented(_)) => self.presented += 1,
            FrameOutcome::Completed(QueueOutcome::Cancelled(_)) => self.cancelled += 1,
            FrameOutcome::Completed(QueueOutcome::NoBuffer) => self.no_buffer += 1,
            FrameOutcome::Completed(QueueOutcome::NotRequired) => self.not_required += 1,
            FrameOutcome::PrepareFailed(_) => self.prepare_failed += 1,
        }
    }
}

/// Single-writer driver for one display's render surface
pub struct FrameProducer {
    surface: RenderSurface,
    renderer: Box<dyn FrameRenderer>,
    escalation: Box<dyn EscalationHandler>,
    fatal: Option<SurfaceError>,
    tally: FrameTally,
}

impl FrameProducer {
    pub fn new(
        surface: RenderSurface,
        renderer: Box<dyn FrameRenderer>,
        escalation: Box<dyn EscalationHandler>,
    ) -> Self {
        Self {
            surface,
            renderer,
            escalation,
            fatal: None,
            tally: FrameTally::default(),
        }
    }

    pub fn initialize(&mut self) {
        self.surface.initialize();
        info!(
            "🖥️ Render surface ready for display [{}] at {}",
            self.surface.display().name(),
            self.surface.size()
        );
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    pub fn tally(&self) -> FrameTally {
        self.tally
    }

    /// Fatal error that stopped this producer, if any
    pub fn fatal_error(&self) -> Option<&SurfaceError> {
        self.fatal.as_ref()
    }

    pub fn resize(&mut self, size: Size) {
        self.surface.set_display_size(size);
    }

    pub fn set_protected(&mut self, use_protected: bool) -> Status {
        self.surface.set_protected(use_protected)
    }

    pub fn set_dataspace(&mut self, dataspace: Dataspace) {
        self.surface.set_buffer_dataspace(dataspace);
    }

    /// Runs one complete frame.
    ///
    /// After a fatal hand-off failure the producer refuses further frames and
    /// keeps returning the original error.
    pub fn run_frame(&mut self, must_recompose: bool) -> Result<FrameReport, SurfaceError> {
        if let Some(fatal) = &self.fatal {
            return Err(fatal.clone());
        }

        let begin_status = self.surface.begin_frame(must_recompose);
        if let Err(status) = begin_status {
            debug!(
                "[{}] beginFrame returned {}",
                self.surface.display().name(),
                status.code()
            );
        }

        if let Err(status) = self.surface.prepare_frame() {
            let report = FrameReport {
                begin_status,
                composition: None,
                outcome: FrameOutcome::PrepareFailed(status),
                page_flip_count: self.surface.page_flip_count(),
            };
            self.tally.record(&report);
            return Ok(report);
        }
        let composition = self.surface.last_composition();

        let ready = if composition.is_some_and(|c| c.needs_client_target()) {
            self.surface.set_viewport_and_projection();
            let (buffer, acquire) = self.surface.dequeue_buffer();
            match buffer {
                Some(buffer) => self.renderer.render(buffer, acquire),
                None => Fence::no_fence(),
            }
        } else {
            Fence::no_fence()
        };

        match self.surface.queue_buffer(ready) {
            Ok(outcome) => {
                self.surface.flip();
                self.surface.on_present_display_completed();
                let report = FrameReport {
                    begin_status,
                    composition,
                    outcome: FrameOutcome::Completed(outcome),
                    page_flip_count: self.surface.page_flip_count(),
                };
                self.tally.record(&report);
                Ok(report)
            }
            Err(err) => {
                if err.is_fatal() {
                    self.fatal = Some(err.clone());
                    self.escalation.escalate(&err);
                }
                Err(err)
            }
        }
    }

    /// Runs up to `frames` frames, stopping at the first error
    pub fn run_frames(&mut self, frames: u64) -> Result<FrameTally, SurfaceError> {
        for n in 0..frames {
            self.run_frame(n == 0)?;
        }
        Ok(self.tally)
    }

    pub fn into_surface(self) -> RenderSurface {
        self.surface
    }
}
