//! In-memory buffer queue shared by the simulated window and sink
//!
//! Slots rotate through `Free -> Dequeued -> Queued -> Acquired -> Free`.
//! The producer end is [`SimNativeWindow`](super::SimNativeWindow), the
//! consumer end is [`SimDisplaySurface`](super::SimDisplaySurface).

use log::debug;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use super::FaultPlan;
use crate::buffer::{BufferId, BufferUsage, Dataspace, GraphicBuffer, PixelFormat, Size};
use crate::fence::Fence;
use crate::status::{Status, StatusError};

/// Slot lifecycle inside the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Available for the producer
    Free,
    /// Owned by the producer
    Dequeued,
    /// Waiting for the consumer
    Queued,
    /// Being scanned out
    Acquired,
}

#[derive(Debug)]
struct Slot {
    id: BufferId,
    state: SlotState,
    /// Fires when the consumer stops reading the slot
    release_fence: Fence,
    /// Producer's ready fence from the last queue
    ready_fence: Fence,
}

impl Slot {
    fn new() -> Self {
        Self {
            id: BufferId::new_unique(),
            state: SlotState::Free,
            release_fence: Fence::no_fence(),
            ready_fence: Fence::no_fence(),
        }
    }
}

/// Counters collected by the queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub connects: u64,
    pub disconnects: u64,
    pub dequeues: u64,
    pub dequeue_failures: u64,
    pub queued: Vec<BufferId>,
    pub queue_failures: u64,
    pub cancelled: Vec<BufferId>,
    pub acquired: u64,
    /// Signal ids of the ready fences received with queued buffers
    pub ready_fence_signals: Vec<Option<u64>>,
}

#[derive(Debug)]
pub(crate) struct QueueCore {
    slots: Vec<Slot>,
    queued: VecDeque<usize>,
    current: Option<usize>,
    pending_release: Vec<Fence>,
    size: Size,
    format: PixelFormat,
    usage: BufferUsage,
    dataspace: Dataspace,
    connected: bool,
    faults: FaultPlan,
    stats: QueueStats,
}

/// Handle onto a shared simulated buffer queue
#[derive(Debug, Clone)]
pub struct SimBufferQueue {
    core: Arc<Mutex<QueueCore>>,
}

impl SimBufferQueue {
    pub fn new(size: Size, buffer_count: usize, faults: FaultPlan) -> Self {
        let core = QueueCore {
            slots: (0..buffer_count).map(|_| Slot::new()).collect(),
            queued: VecDeque::new(),
            current: None,
            pending_release: Vec::new(),
            size,
            format: PixelFormat::RGBA8888,
            usage: BufferUsage::empty(),
            dataspace: Dataspace::Unknown,
            connected: false,
            faults,
            stats: QueueStats::default(),
        };
        Self {
            core: Arc::new(Mutex::new(core)),
        }
    }

    pub fn stats(&self) -> QueueStats {
        self.core.lock().stats.clone()
    }

    pub fn slot_states(&self) -> Vec<SlotState> {
        self.core.lock().slots.iter().map(|s| s.state).collect()
    }

    pub fn usage(&self) -> BufferUsage {
        self.core.lock().usage
    }

    pub fn format(&self) -> PixelFormat {
        self.core.lock().format
    }

    pub fn dataspace(&self) -> Dataspace {
        self.core.lock().dataspace
    }

    pub fn size(&self) -> Size {
        self.core.lock().size
    }

    pub fn is_connected(&self) -> bool {
        self.core.lock().connected
    }

    /// Buffer currently held by the consumer
    pub fn current(&self) -> Option<BufferId> {
        let core = self.core.lock();
        core.current.map(|idx| core.slots[idx].id)
    }

    // -- producer side ----------------------------------------------------

    pub(crate) fn connect(&self) -> Status {
        let mut core = self.core.lock();
        if core.connected {
            return Err(StatusError::InvalidOperation);
        }
        core.connected = true;
        core.stats.connects += 1;
        Ok(())
    }

    pub(crate) fn disconnect(&self) -> Status {
        let mut core = self.core.lock();
        if !core.connected {
            return Err(StatusError::NoInit);
        }
        core.connected = false;
        core.stats.disconnects += 1;
        Ok(())
    }

    pub(crate) fn set_format(&self, format: PixelFormat) -> Status {
        self.core.lock().format = format;
        Ok(())
    }

    pub(crate) fn set_usage(&self, usage: BufferUsage) -> Status {
        let mut core = self.core.lock();
        if core.faults.fail_usage {
            return Err(StatusError::BadValue);
        }
        core.usage = usage;
        Ok(())
    }

    pub(crate) fn set_dataspace(&self, dataspace: Dataspace) -> Status {
        self.core.lock().dataspace = dataspace;
        Ok(())
    }

    pub(crate) fn dequeue(&self) -> Result<(GraphicBuffer, Fence), StatusError> {
        let mut core = self.core.lock();
        let attempt = core.stats.dequeues + core.stats.dequeue_failures + 1;

        if !core.connected {
            core.stats.dequeue_failures += 1;
            return Err(StatusError::NoInit);
        }
        if FaultPlan::hits(core.faults.fail_dequeue_every, attempt) {
            core.stats.dequeue_failures += 1;
            return Err(StatusError::TimedOut);
        }

        let Some(idx) = core.slots.iter().position(|s| s.state == SlotState::Free) else {
            core.stats.dequeue_failures += 1;
            return Err(StatusError::WouldBlock);
        };

        let (size, format, usage) = (core.size, core.format, core.usage);
        let slot = &mut core.slots[idx];
        slot.state = SlotState::Dequeued;
        let fence = std::mem::take(&mut slot.release_fence);
        let buffer = GraphicBuffer::new(
            slot.id,
            size.width.max(0) as u32,
            size.height.max(0) as u32,
            format,
            usage,
        );
        core.stats.dequeues += 1;
        Ok((buffer, fence))
    }

    fn dequeued_slot(core: &QueueCore, buffer: &GraphicBuffer) -> Result<usize, StatusError> {
        core.slots
            .iter()
            .position(|s| s.id == buffer.id() && s.state == SlotState::Dequeued)
            .ok_or(StatusError::BadValue)
    }

    pub(crate) fn queue(&self, buffer: &GraphicBuffer, fence: Fence) -> Status {
        let mut core = self.core.lock();
        let attempt = core.stats.queued.len() as u64 + core.stats.queue_failures + 1;

        let idx = match Self::dequeued_slot(&core, buffer) {
            Ok(idx) => idx,
            Err(e) => {
                core.stats.queue_failures += 1;
                return Err(e);
            }
        };
        if FaultPlan::hits(core.faults.fail_queue_every, attempt) {
            core.stats.queue_failures += 1;
            return Err(StatusError::DeadObject);
        }

        core.stats.ready_fence_signals.push(fence.signal_id());
        let slot = &mut core.slots[idx];
        slot.state = SlotState::Queued;
        slot.ready_fence = fence;
        core.queued.push_back(idx);
        core.stats.queued.push(buffer.id());
        Ok(())
    }

    pub(crate) fn cancel(&self, buffer: &GraphicBuffer, fence: Fence) -> Status {
        let mut core = self.core.lock();
        let idx = Self::dequeued_slot(&core, buffer)?;
        let slot = &mut core.slots[idx];
        slot.state = SlotState::Free;
        slot.release_fence = fence;
        core.stats.cancelled.push(buffer.id());
        Ok(())
    }

    // -- consumer side ----------------------------------------------------

    /// Latches the newest queued buffer, dropping older ones
    pub(crate) fn acquire_latest(&self) -> Option<BufferId> {
        let mut core = self.core.lock();
        let newest = core.queued.pop_back()?;

        while let Some(stale) = core.queued.pop_front() {
            let slot = &mut core.slots[stale];
            slot.state = SlotState::Free;
            slot.release_fence = std::mem::take(&mut slot.ready_fence);
        }

        if let Some(previous) = core.current.replace(newest) {
            let release = Fence::pending();
            let pending = release.dup();
            let slot = &mut core.slots[previous];
            slot.state = SlotState::Free;
            slot.release_fence = release;
            core.pending_release.push(pending);
        }

        core.slots[newest].state = SlotState::Acquired;
        core.stats.acquired += 1;
        let id = core.slots[newest].id;
        debug!("Sim queue acquired buffer {}", id);
        Some(id)
    }

    /// Signals release fences of buffers the display stopped reading
    pub(crate) fn release_committed(&self) -> usize {
        let mut core = self.core.lock();
        let released = core.pending_release.len();
        for fence in core.pending_release.drain(..) {
            fence.signal();
        }
        released
    }

    /// Ready fence of the buffer currently being scanned out
    pub(crate) fn current_ready_fence(&self) -> Fence {
        let core = self.core.lock();
        match core.current {
            Some(idx) => core.slots[idx].ready_fence.dup(),
            None => Fence::no_fence(),
        }
    }

    pub(crate) fn resize(&self, width: i32, height: i32) {
        let mut core = self.core.lock();
        core.size = Size::new(width, height);
        // Free slots get fresh storage at the new size
        for slot in core.slots.iter_mut().filter(|s| s.state == SlotState::Free) {
            slot.id = BufferId::new_unique();
            slot.release_fence = Fence::no_fence();
        }
    }

    pub(crate) fn fault_plan(&self) -> FaultPlan {
        self.core.lock().faults.clone()
    }

    pub(crate) fn describe(&self) -> String {
        let core = self.core.lock();
        let free = core.slots.iter().filter(|s| s.state == SlotState::Free).count();
        format!(
            "slots={} free={} queued={} current={} size={}",
            core.slots.len(),
            free,
            core.queued.len(),
            core.current
                .map(|idx| core.slots[idx].id.to_string())
                .unwrap_or_else(|| "none".to_string()),
            core.size
        )
    }
}
