//! Producer and consumer ends of a simulated display buffer queue

use log::debug;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use super::queue::SimBufferQueue;
use super::FaultPlan;
use crate::buffer::{BufferUsage, Dataspace, GraphicBuffer, PixelFormat};
use crate::composition::CompositionType;
use crate::display_surface::DisplaySurface;
use crate::fence::Fence;
use crate::native_window::NativeWindow;
use crate::status::{Status, StatusError};

static NEXT_WINDOW_HANDLE: AtomicU64 = AtomicU64::new(0x7f00_0000);

/// Producer end: what a render surface dequeues from and queues into
#[derive(Debug)]
pub struct SimNativeWindow {
    queue: SimBufferQueue,
    handle: u64,
}

impl SimNativeWindow {
    pub fn new(queue: SimBufferQueue) -> Self {
        Self {
            queue,
            handle: NEXT_WINDOW_HANDLE.fetch_add(0x100, Ordering::Relaxed),
        }
    }
}

impl NativeWindow for SimNativeWindow {
    fn connect(&mut self) -> Status {
        self.queue.connect()
    }

    fn disconnect(&mut self) -> Status {
        self.queue.disconnect()
    }

    fn set_buffers_format(&mut self, format: PixelFormat) -> Status {
        self.queue.set_format(format)
    }

    fn set_usage(&mut self, usage: BufferUsage) -> Status {
        self.queue.set_usage(usage)
    }

    fn set_buffers_dataspace(&mut self, dataspace: Dataspace) -> Status {
        self.queue.set_dataspace(dataspace)
    }

    fn dequeue_buffer(&mut self) -> Result<(GraphicBuffer, Fence), StatusError> {
        self.queue.dequeue()
    }

    fn queue_buffer(&mut self, buffer: &GraphicBuffer, fence: Fence) -> Status {
        self.queue.queue(buffer, fence)
    }

    fn cancel_buffer(&mut self, buffer: &GraphicBuffer, fence: Fence) -> Status {
        self.queue.cancel(buffer, fence)
    }

    fn format(&self) -> PixelFormat {
        self.queue.format()
    }

    fn handle(&self) -> u64 {
        self.handle
    }
}

/// What the simulated sink saw, for assertions and summaries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub frames_begun: u64,
    pub recompositions: u64,
    pub compositions: Vec<CompositionType>,
    pub advanced: u64,
    pub advance_failures: u64,
    pub committed: u64,
    pub resizes: Vec<(i32, i32)>,
}

/// Consumer end feeding a (simulated) panel
#[derive(Debug)]
pub struct SimDisplaySurface {
    queue: SimBufferQueue,
    faults: FaultPlan,
    stats: Mutex<SinkStats>,
}

impl SimDisplaySurface {
    pub fn new(queue: SimBufferQueue) -> Self {
        let faults = queue.fault_plan();
        Self {
            queue,
            faults,
            stats: Mutex::new(SinkStats::default()),
        }
    }

    pub fn stats(&self) -> SinkStats {
        self.stats.lock().clone()
    }
}

impl DisplaySurface for SimDisplaySurface {
    fn begin_frame(&self, must_recompose: bool) -> Status {
        let mut stats = self.stats.lock();
        stats.frames_begun += 1;
        if must_recompose {
            stats.recompositions += 1;
        }
        Ok(())
    }

    fn prepare_frame(&self, composition: CompositionType) -> Status {
        self.stats.lock().compositions.push(composition);
        Ok(())
    }

    fn advance_frame(&self) -> Status {
        let mut stats = self.stats.lock();
        let attempt = stats.advanced + stats.advance_failures + 1;
        if FaultPlan::hits(self.faults.fail_advance_every, attempt) {
            stats.advance_failures += 1;
            return Err(StatusError::BadValue);
        }
        stats.advanced += 1;
        drop(stats);

        // Hardware-only frames leave nothing queued; the current buffer stays
        if let Some(id) = self.queue.acquire_latest() {
            debug!("Sim sink latched client target {}", id);
        }
        Ok(())
    }

    fn on_frame_committed(&self) {
        self.queue.release_committed();
        self.stats.lock().committed += 1;
    }

    fn resize_buffers(&self, width: i32, height: i32) {
        self.queue.resize(width, height);
        self.stats.lock().resizes.push((width, height));
    }

    fn client_target_acquire_fence(&self) -> Fence {
        self.queue.current_ready_fence()
    }

    fn dump_as_string(&self) -> String {
        let stats = self.stats.lock();
        format!(
            "   SimDisplaySurface: {} advanced={} committed={}\n",
            self.queue.describe(),
            stats.advanced,
            stats.committed
        )
    }
}
