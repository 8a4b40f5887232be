//! Stand-in GPU: records viewport setup and "renders" by waiting on fences

use log::warn;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::buffer::{GraphicBuffer, Rect};
use crate::fence::Fence;
use crate::frame::FrameRenderer;
use crate::render_engine::{RenderEngine, Transform};

/// Viewport requested through [`RenderEngine::set_viewport_and_projection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: i32,
    pub height: i32,
    pub source_crop: Rect,
    pub orientation: Transform,
}

#[derive(Debug, Default)]
pub struct SimRenderEngine {
    viewports: Mutex<Vec<Viewport>>,
}

impl SimRenderEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn viewports(&self) -> Vec<Viewport> {
        self.viewports.lock().clone()
    }
}

impl RenderEngine for SimRenderEngine {
    fn set_viewport_and_projection(
        &self,
        width: i32,
        height: i32,
        source_crop: Rect,
        orientation: Transform,
    ) {
        self.viewports.lock().push(Viewport {
            width,
            height,
            source_crop,
            orientation,
        });
    }
}

/// Counters shared between a [`SimRenderer`] and whoever inspects it
#[derive(Debug, Default)]
pub struct RenderCounters {
    pub draws: AtomicU64,
    pub late_acquires: AtomicU64,
    /// Pixel storage written across all draws
    pub bytes_drawn: AtomicU64,
}

/// Client composition stand-in.
///
/// Waits for the dequeue fence, then returns an already signalled ready
/// fence. A fence that does not fire within the timeout is counted and the
/// draw proceeds anyway.
#[derive(Debug)]
pub struct SimRenderer {
    acquire_timeout: Duration,
    counters: Arc<RenderCounters>,
}

impl SimRenderer {
    pub fn new(acquire_timeout: Duration) -> Self {
        Self {
            acquire_timeout,
            counters: Arc::new(RenderCounters::default()),
        }
    }

    pub fn counters(&self) -> Arc<RenderCounters> {
        Arc::clone(&self.counters)
    }

    pub fn draw(&mut self, buffer: &GraphicBuffer, acquire: Fence) -> Fence {
        if acquire.wait(self.acquire_timeout).is_err() {
            warn!(
                "Acquire fence for buffer {} did not fire within {:?}",
                buffer.id(),
                self.acquire_timeout
            );
            self.counters.late_acquires.fetch_add(1, Ordering::Relaxed);
        }
        self.counters.draws.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes_drawn
            .fetch_add(buffer.byte_len() as u64, Ordering::Relaxed);
        Fence::signaled()
    }

    pub fn boxed(mut self) -> Box<dyn FrameRenderer> {
        Box::new(move |buffer: &GraphicBuffer, acquire: Fence| self.draw(buffer, acquire))
    }
}
