//! Simulated display stack
//!
//! In-process stand-ins for the collaborators a render surface talks to: a
//! buffer queue with a producer window and consumer sink, a scripted hardware
//! composer, and a GPU that only waits on fences. Each can be told to fail
//! on a schedule through a [`FaultPlan`], which is how the virtual and
//! physical failure policies are exercised without real hardware.
//!
//! # Usage
//!
//! ```no_run
//! use render_surface::config::SimConfig;
//! use render_surface::frame::EscalationLog;
//! use render_surface::observer::LogObserver;
//! use render_surface::sim::{SimCompositionBackend, SimDisplay};
//! use std::sync::Arc;
//!
//! let config = SimConfig::default();
//! let backend = Arc::new(SimCompositionBackend::new());
//! let mut display = SimDisplay::build(
//!     &config.displays[0],
//!     &config.general,
//!     backend,
//!     Arc::new(LogObserver),
//!     Box::new(EscalationLog::new()),
//! );
//! let summary = display.run(config.general.frames);
//! println!("{}", summary);
//! ```

mod backend;
mod endpoints;
mod queue;
mod render;

pub use backend::{CompositionPattern, SimCompositionBackend};
pub use endpoints::{SimDisplaySurface, SimNativeWindow, SinkStats};
pub use queue::{QueueStats, SimBufferQueue, SlotState};
pub use render::{RenderCounters, SimRenderEngine, SimRenderer, Viewport};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::buffer::Size;
use crate::composition::DisplayId;
use crate::config::{DisplayConfig, GeneralConfig};
use crate::frame::{EscalationHandler, FrameProducer, FrameTally};
use crate::observer::SurfaceObserver;
use crate::surface::{DisplayInfo, RenderSurface, RenderSurfaceCreationArgs};

/// Failure schedule for one simulated display.
///
/// `*_every = Some(n)` fails every n-th call (1-based); `None` never fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultPlan {
    pub fail_dequeue_every: Option<u64>,
    pub fail_queue_every: Option<u64>,
    pub fail_advance_every: Option<u64>,
    pub fail_prepare_every: Option<u64>,
    /// Backend requests a client target flip every n-th frame
    pub flip_client_target_every: Option<u64>,
    /// Every usage change is rejected
    pub fail_usage: bool,
}

impl FaultPlan {
    /// Whether call number `n` falls on the schedule
    pub fn hits(every: Option<u64>, n: u64) -> bool {
        matches!(every, Some(e) if e > 0 && n > 0 && n % e == 0)
    }

    pub fn is_clean(&self) -> bool {
        *self == FaultPlan::default()
    }
}

/// One simulated display: its producer plus handles onto every collaborator
pub struct SimDisplay {
    name: String,
    producer: FrameProducer,
    queue: SimBufferQueue,
    sink: Arc<SimDisplaySurface>,
    engine: Arc<SimRenderEngine>,
    render_counters: Arc<RenderCounters>,
}

impl SimDisplay {
    /// Wires a render surface to simulated collaborators and initializes it
    pub fn build(
        config: &DisplayConfig,
        general: &GeneralConfig,
        backend: Arc<SimCompositionBackend>,
        observer: Arc<dyn SurfaceObserver>,
        escalation: Box<dyn EscalationHandler>,
    ) -> Self {
        let size = Size::new(config.width, config.height);
        let queue = SimBufferQueue::new(size, config.buffer_count, config.faults.clone());

        let hwc_id = config.hwc_id.map(DisplayId);
        if let Some(id) = hwc_id {
            backend.register(id, config.composition, config.faults.clone());
        }

        let sink = Arc::new(SimDisplaySurface::new(queue.clone()));
        let engine = Arc::new(SimRenderEngine::new());
        let surface = RenderSurface::new(RenderSurfaceCreationArgs {
            display: DisplayInfo::new(config.name.clone(), hwc_id, config.kind),
            size,
            native_window: Box::new(SimNativeWindow::new(queue.clone())),
            display_surface: sink.clone(),
            backend,
            render_engine: engine.clone(),
            observer,
        });

        let renderer = SimRenderer::new(Duration::from_millis(general.acquire_timeout_ms));
        let render_counters = renderer.counters();
        let mut producer = FrameProducer::new(surface, renderer.boxed(), escalation);

        producer.initialize();
        if config.protected {
            // A rejected protected switch leaves the display unprotected
            let _ = producer.set_protected(true);
        }
        producer.set_dataspace(config.dataspace);

        Self {
            name: config.name.clone(),
            producer,
            queue,
            sink,
            engine,
            render_counters,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn producer(&self) -> &FrameProducer {
        &self.producer
    }

    pub fn producer_mut(&mut self) -> &mut FrameProducer {
        &mut self.producer
    }

    pub fn surface(&self) -> &RenderSurface {
        self.producer.surface()
    }

    pub fn queue(&self) -> &SimBufferQueue {
        &self.queue
    }

    pub fn sink(&self) -> &SimDisplaySurface {
        &self.sink
    }

    pub fn engine(&self) -> &SimRenderEngine {
        &self.engine
    }

    /// Runs `frames` frames or until a fatal error stops the producer
    pub fn run(&mut self, frames: u64) -> DisplaySummary {
        let fatal = self.producer.run_frames(frames).err();
        self.summary(fatal.map(|e| e.to_string()))
    }

    fn summary(&self, fatal: Option<String>) -> DisplaySummary {
        let mut dump = String::new();
        self.surface().dump(&mut dump);
        DisplaySummary {
            name: self.name.clone(),
            tally: self.producer.tally(),
            flips: self.surface().page_flip_count(),
            protected: self.surface().is_protected(),
            draws: self.render_counters.draws.load(Ordering::Relaxed),
            late_acquires: self.render_counters.late_acquires.load(Ordering::Relaxed),
            bytes_drawn: self.render_counters.bytes_drawn.load(Ordering::Relaxed),
            queue: self.queue.stats(),
            sink: self.sink.stats(),
            fatal,
            dump,
        }
    }
}

/// What happened on one simulated display
#[derive(Debug, Clone)]
pub struct DisplaySummary {
    pub name: String,
    pub tally: FrameTally,
    pub flips: u64,
    pub protected: bool,
    pub draws: u64,
    pub late_acquires: u64,
    pub bytes_drawn: u64,
    pub queue: QueueStats,
    pub sink: SinkStats,
    pub fatal: Option<String>,
    pub dump: String,
}

impl fmt::Display for DisplaySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] frames={} presented={} cancelled={} no_buffer={} hwc_only={} prepare_failed={} flips={} draws={} drawn_bytes={}",
            self.name,
            self.tally.frames,
            self.tally.presented,
            self.tally.cancelled,
            self.tally.no_buffer,
            self.tally.not_required,
            self.tally.prepare_failed,
            self.flips,
            self.draws,
            self.bytes_drawn,
        )?;
        if let Some(fatal) = &self.fatal {
            write!(f, " FATAL: {}", fatal)?;
        }
        Ok(())
    }
}
