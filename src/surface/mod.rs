//! Render surface: per-display frame buffer hand-off
//!
//! A [`RenderSurface`] sits between three asynchronous actors: the GPU
//! renderer drawing client composition, the hardware composer, and the
//! presentation sink consuming the display's buffer queue. It keeps at most
//! one dequeued buffer per frame and sequences every frame as
//!
//! ```text
//! begin_frame -> prepare_frame -> [dequeue_buffer -> render] -> queue_buffer
//!             -> flip -> on_present_display_completed
//! ```
//!
//! The surface does no locking of its own. One frame producer drives each
//! surface; separate displays may be driven from separate threads.
//!
//! Failures are reported through the injected [`SurfaceObserver`] and
//! absorbed, except a rejected hand-off on a physical display, which comes
//! back as [`SurfaceError::QueueFailedOnPrimary`]. Nothing in this module
//! aborts the process on its own.

use std::sync::Arc;

use crate::buffer::{BufferId, BufferUsage, Dataspace, GraphicBuffer, PixelFormat, Rect, Size};
use crate::composition::{classify, CompositionBackend, CompositionType, DisplayId};
use crate::display_surface::DisplaySurface;
use crate::error::SurfaceError;
use crate::fence::Fence;
use crate::native_window::NativeWindow;
use crate::observer::{SurfaceEvent, SurfaceObserver};
use crate::render_engine::{RenderEngine, Transform};
use crate::status::Status;
use serde::{Deserialize, Serialize};

/// Whether a display is a physical panel or a virtual consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayKind {
    /// Built-in or external panel. A stuck queue here stalls everything.
    Physical,
    /// Screen recording, remote display and similar; may drop frames
    Virtual,
}

/// Identity of the display a surface renders for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayInfo {
    name: String,
    id: Option<DisplayId>,
    kind: DisplayKind,
}

impl DisplayInfo {
    pub fn new(name: impl Into<String>, id: Option<DisplayId>, kind: DisplayKind) -> Self {
        Self {
            name: name.into(),
            id,
            kind,
        }
    }

    pub fn physical(name: impl Into<String>, id: DisplayId) -> Self {
        Self::new(name, Some(id), DisplayKind::Physical)
    }

    /// Virtual display; `id` is `None` when the hardware composer cannot
    /// back it and everything goes through the GPU
    pub fn virtual_display(name: impl Into<String>, id: Option<DisplayId>) -> Self {
        Self::new(name, id, DisplayKind::Virtual)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hardware composer id, if any
    pub fn id(&self) -> Option<DisplayId> {
        self.id
    }

    pub fn kind(&self) -> DisplayKind {
        self.kind
    }

    pub fn is_virtual(&self) -> bool {
        self.kind == DisplayKind::Virtual
    }
}

/// Where the current frame is in its lifecycle.
///
/// `Idle -> Begun -> Prepared -> HasBuffer | NoBuffer`, then `queue_buffer`
/// records how the frame resolved (`Presented`, `Cancelled`, `NoBuffer`,
/// `Skipped` or `Escalated`) and the completed present returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Begun,
    Prepared(CompositionType),
    /// A client target buffer is dequeued and owned by the surface
    HasBuffer,
    /// Dequeue failed and the surface holds no buffer
    NoBuffer,
    /// Client target handed to the native window
    Presented,
    /// Hand-off rejected on a virtual display; buffer cancelled
    Cancelled,
    /// No client target was needed this frame
    Skipped,
    /// Hand-off failed on a physical display. Terminal.
    Escalated,
}

impl FrameState {
    fn resolved(outcome: QueueOutcome) -> Self {
        match outcome {
            QueueOutcome::Presented(_) => FrameState::Presented,
            QueueOutcome::Cancelled(_) => FrameState::Cancelled,
            QueueOutcome::NoBuffer => FrameState::NoBuffer,
            QueueOutcome::NotRequired => FrameState::Skipped,
        }
    }
}

/// How `queue_buffer` resolved the frame's client target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    /// Buffer handed to the native window
    Presented(BufferId),
    /// Hand-off failed on a virtual display; buffer returned unpresented
    Cancelled(BufferId),
    /// Client target required but no buffer could be obtained
    NoBuffer,
    /// Frame had no client composition and no flip request
    NotRequired,
}

/// Collaborators and initial state for a [`RenderSurface`]
pub struct RenderSurfaceCreationArgs {
    pub display: DisplayInfo,
    pub size: Size,
    pub native_window: Box<dyn NativeWindow>,
    pub display_surface: Arc<dyn DisplaySurface>,
    pub backend: Arc<dyn CompositionBackend>,
    pub render_engine: Arc<dyn RenderEngine>,
    pub observer: Arc<dyn SurfaceObserver>,
}

/// Frame buffer hand-off coordinator for one display
pub struct RenderSurface {
    display: DisplayInfo,
    native_window: Box<dyn NativeWindow>,
    display_surface: Arc<dyn DisplaySurface>,
    backend: Arc<dyn CompositionBackend>,
    render_engine: Arc<dyn RenderEngine>,
    observer: Arc<dyn SurfaceObserver>,

    size: Size,
    protected: bool,
    /// Client target owned between dequeue and queue/cancel
    graphic_buffer: Option<GraphicBuffer>,
    page_flip_count: u64,
    state: FrameState,
    composition: Option<CompositionType>,
}

impl RenderSurface {
    pub fn new(args: RenderSurfaceCreationArgs) -> Self {
        Self {
            display: args.display,
            native_window: args.native_window,
            display_surface: args.display_surface,
            backend: args.backend,
            render_engine: args.render_engine,
            observer: args.observer,
            size: args.size,
            protected: false,
            graphic_buffer: None,
            page_flip_count: 0,
            state: FrameState::Idle,
            composition: None,
        }
    }

    fn emit(&self, event: SurfaceEvent) {
        self.observer.on_event(self.display.name(), &event);
    }

    /// Escalated is sticky
    fn set_state(&mut self, state: FrameState) {
        if self.state != FrameState::Escalated {
            self.state = state;
        }
    }

    pub fn display(&self) -> &DisplayInfo {
        &self.display
    }

    /// Whether the configured size has positive area
    pub fn is_valid(&self) -> bool {
        self.size.is_valid()
    }

    /// Connects the GPU producer and configures RGBA8888 render buffers.
    ///
    /// Best effort: each failing step is reported and the next one still runs.
    pub fn initialize(&mut self) {
        if let Err(status) = self.native_window.connect() {
            self.emit(SurfaceEvent::ConnectFailed(status));
        }
        if let Err(status) = self.native_window.set_buffers_format(PixelFormat::RGBA8888) {
            self.emit(SurfaceEvent::FormatRejected(status));
        }
        let usage = BufferUsage::HW_RENDER;
        if let Err(status) = self.native_window.set_usage(usage) {
            self.emit(SurfaceEvent::UsageRejected {
                usage,
                protected: false,
                status,
            });
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Resizes the sink's buffers. Only valid between frames.
    pub fn set_display_size(&mut self, size: Size) {
        self.display_surface.resize_buffers(size.width, size.height);
        self.size = size;
    }

    /// Tags subsequently queued buffers with a color space. Failures are
    /// reported but never returned.
    pub fn set_buffer_dataspace(&mut self, dataspace: Dataspace) {
        if let Err(status) = self.native_window.set_buffers_dataspace(dataspace) {
            self.emit(SurfaceEvent::DataspaceRejected { dataspace, status });
        }
    }

    /// Switches protected-content usage on or off.
    ///
    /// The cached flag only changes once the native window accepted the new
    /// usage mask; on failure the previous mode stays in effect.
    pub fn set_protected(&mut self, use_protected: bool) -> Status {
        let mut usage = BufferUsage::HW_RENDER;
        if use_protected {
            usage |= BufferUsage::PROTECTED;
        }

        match self.native_window.set_usage(usage) {
            Ok(()) => {
                self.protected = use_protected;
                Ok(())
            }
            Err(status) => {
                self.emit(SurfaceEvent::UsageRejected {
                    usage,
                    protected: use_protected,
                    status,
                });
                Err(status)
            }
        }
    }

    pub fn is_protected(&self) -> bool {
        self.protected
    }

    pub fn begin_frame(&mut self, must_recompose: bool) -> Status {
        self.set_state(FrameState::Begun);
        self.display_surface.begin_frame(must_recompose)
    }

    /// Runs hardware prepare and tells the sink which path owns this frame.
    ///
    /// Displays without a hardware composer id skip prepare. A prepare error
    /// is returned as-is and the caller must not dequeue or queue this frame.
    pub fn prepare_frame(&mut self) -> Status {
        let id = self.display.id();
        if let Some(id) = id {
            if let Err(status) = self.backend.prepare(id) {
                self.emit(SurfaceEvent::PrepareFailed(status));
                return Err(status);
            }
        }

        let composition = classify(
            self.backend.has_client_composition(id),
            self.backend.has_device_composition(id),
        );
        self.composition = Some(composition);
        self.set_state(FrameState::Prepared(composition));
        self.emit(SurfaceEvent::CompositionPrepared(composition));

        self.display_surface.prepare_frame(composition)
    }

    /// Dequeues the next client target and the fence guarding it.
    ///
    /// On failure the previously cached buffer (possibly none) comes back
    /// with an empty fence; rendering into it this frame is unreliable.
    pub fn dequeue_buffer(&mut self) -> (Option<&GraphicBuffer>, Fence) {
        match self.native_window.dequeue_buffer() {
            Ok((buffer, fence)) => {
                if let Some(previous) = &self.graphic_buffer {
                    self.emit(SurfaceEvent::BufferClobbered {
                        previous: previous.id(),
                    });
                }
                self.emit(SurfaceEvent::Dequeued(buffer.id()));
                self.graphic_buffer = Some(buffer);
                self.set_state(FrameState::HasBuffer);
                (self.graphic_buffer.as_ref(), fence)
            }
            Err(status) => {
                self.emit(SurfaceEvent::DequeueFailed(status));
                if self.graphic_buffer.is_none() {
                    self.set_state(FrameState::NoBuffer);
                }
                (self.graphic_buffer.as_ref(), Fence::no_fence())
            }
        }
    }

    /// Hands the rendered client target to the native window and advances
    /// the sink.
    ///
    /// The cached buffer is always released before this returns. On a
    /// virtual display a rejected hand-off cancels the buffer and the frame
    /// is dropped; on a physical display it is returned as a fatal
    /// [`SurfaceError::QueueFailedOnPrimary`] and the sink is not advanced.
    /// Every other path advances the sink exactly once; only the escalation
    /// path skips it, since the process is about to be torn down.
    pub fn queue_buffer(&mut self, ready_fence: Fence) -> Result<QueueOutcome, SurfaceError> {
        let id = self.display.id();
        let needs_client_target = self.backend.has_client_composition(id)
            || self.backend.has_flip_client_target_request(id);

        let resolved = if needs_client_target {
            // A flip request can arrive without any GPU work having dequeued
            // a buffer. The slot is empty here only after a completed queue
            // or before the first dequeue, so this cannot deadlock.
            if self.graphic_buffer.is_none() {
                self.emit(SurfaceEvent::ScratchDequeue);
                let _ = self.dequeue_buffer();
            }

            match self.graphic_buffer.take() {
                Some(buffer) => self.hand_off(buffer, &ready_fence),
                None => {
                    self.emit(SurfaceEvent::NoBufferReady);
                    Ok(QueueOutcome::NoBuffer)
                }
            }
        } else {
            if let Some(buffer) = self.graphic_buffer.take() {
                self.discard(buffer, &ready_fence);
            }
            Ok(QueueOutcome::NotRequired)
        };

        let outcome = match resolved {
            Ok(outcome) => outcome,
            Err(err) => {
                self.state = FrameState::Escalated;
                return Err(err);
            }
        };

        self.set_state(FrameState::resolved(outcome));
        if let Err(status) = self.display_surface.advance_frame() {
            self.emit(SurfaceEvent::AdvanceFrameFailed(status));
        }
        Ok(outcome)
    }

    fn hand_off(
        &mut self,
        buffer: GraphicBuffer,
        ready_fence: &Fence,
    ) -> Result<QueueOutcome, SurfaceError> {
        let id = buffer.id();
        match self.native_window.queue_buffer(&buffer, ready_fence.dup()) {
            Ok(()) => {
                self.emit(SurfaceEvent::Queued(id));
                Ok(QueueOutcome::Presented(id))
            }
            Err(status) => {
                self.emit(SurfaceEvent::QueueFailed { buffer: id, status });
                if !self.display.is_virtual() {
                    self.emit(SurfaceEvent::Escalated(status));
                    return Err(SurfaceError::QueueFailedOnPrimary {
                        display: self.display.name().to_string(),
                        status,
                    });
                }
                self.discard(buffer, ready_fence);
                Ok(QueueOutcome::Cancelled(id))
            }
        }
    }

    /// Returns a buffer to the native window without presenting it
    fn discard(&mut self, buffer: GraphicBuffer, ready_fence: &Fence) {
        let id = buffer.id();
        match self.native_window.cancel_buffer(&buffer, ready_fence.dup()) {
            Ok(()) => self.emit(SurfaceEvent::Cancelled(id)),
            Err(status) => self.emit(SurfaceEvent::CancelFailed { buffer: id, status }),
        }
    }

    /// The hardware committed the frame. Call once per present, after
    /// `queue_buffer` returned.
    pub fn on_present_display_completed(&mut self) {
        self.display_surface.on_frame_committed();
        self.set_state(FrameState::Idle);
    }

    /// Points the render engine at the full surface
    pub fn set_viewport_and_projection(&self) {
        let source_crop = Rect::from(self.size);
        self.render_engine.set_viewport_and_projection(
            self.size.width,
            self.size.height,
            source_crop,
            Transform::Rot0,
        );
    }

    pub fn flip(&mut self) {
        self.page_flip_count += 1;
    }

    pub fn page_flip_count(&self) -> u64 {
        self.page_flip_count
    }

    /// Fence the GPU waits on before drawing the next client target
    pub fn client_target_acquire_fence(&self) -> Fence {
        self.display_surface.client_target_acquire_fence()
    }

    pub fn frame_state(&self) -> FrameState {
        self.state
    }

    /// Composition chosen by the most recent successful prepare
    pub fn last_composition(&self) -> Option<CompositionType> {
        self.composition
    }

    pub fn in_flight_buffer(&self) -> Option<&GraphicBuffer> {
        self.graphic_buffer.as_ref()
    }

    pub fn has_in_flight_buffer(&self) -> bool {
        self.graphic_buffer.is_some()
    }

    /// Appends a human readable description of the surface and its sink
    pub fn dump(&self, out: &mut String) {
        out.push_str("   Composition RenderSurface State:");
        out.push_str("\n   ");
        out.push_str(&format!("size={} ", self.size));
        out.push_str(&format!(
            "NativeWindow={:#x} (format {}) ",
            self.native_window.handle(),
            self.native_window.format().code()
        ));
        out.push_str(&format!("flips={} ", self.page_flip_count));
        out.push('\n');
        out.push_str(&self.display_surface.dump_as_string());
    }

    #[doc(hidden)]
    pub fn set_page_flip_count_for_test(&mut self, count: u64) {
        self.page_flip_count = count;
    }

    #[doc(hidden)]
    pub fn set_size_for_test(&mut self, size: Size) {
        self.size = size;
    }

    #[doc(hidden)]
    pub fn mutable_graphic_buffer_for_test(&mut self) -> &mut Option<GraphicBuffer> {
        &mut self.graphic_buffer
    }
}

impl Drop for RenderSurface {
    fn drop(&mut self) {
        if let Err(status) = self.native_window.disconnect() {
            self.emit(SurfaceEvent::DisconnectFailed(status));
        }
    }
}
