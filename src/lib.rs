//! # Axiom Render Surface
//!
//! Per-display coordinator that moves frame buffers between the GPU
//! renderer, the display's buffer queue and the hardware composer.
//!
//! ## Architecture
//!
//! The render surface sits between four collaborators, each behind a trait:
//! - `native_window`: buffer queue producer endpoint (dequeue, queue, cancel)
//! - `display_surface`: consumer-side sink (begin, prepare, advance)
//! - `composition`: hardware composer queries and prepare
//! - `render_engine`: GPU viewport and projection setup
//!
//! Around the core:
//! - `surface`: the `RenderSurface` state machine
//! - `frame`: single-writer `FrameProducer` driving complete frames
//! - `observer`: anomaly events and their log routing
//! - `sim`: in-process simulated collaborators used by `surface-sim`
//! - `config`: simulator configuration parsing and validation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use render_surface::observer::LogObserver;
//! use render_surface::sim::{
//!     FaultPlan, SimBufferQueue, SimCompositionBackend, SimDisplaySurface, SimNativeWindow,
//!     SimRenderEngine,
//! };
//! use render_surface::{DisplayInfo, Fence, RenderSurface, RenderSurfaceCreationArgs, Size};
//! use std::sync::Arc;
//!
//! let size = Size::new(1280, 720);
//! let queue = SimBufferQueue::new(size, 2, FaultPlan::default());
//! let mut surface = RenderSurface::new(RenderSurfaceCreationArgs {
//!     display: DisplayInfo::virtual_display("recording", None),
//!     size,
//!     native_window: Box::new(SimNativeWindow::new(queue.clone())),
//!     display_surface: Arc::new(SimDisplaySurface::new(queue)),
//!     backend: Arc::new(SimCompositionBackend::new()),
//!     render_engine: Arc::new(SimRenderEngine::new()),
//!     observer: Arc::new(LogObserver),
//! });
//!
//! surface.initialize();
//! surface.begin_frame(true)?;
//! surface.prepare_frame()?;
//! let (_buffer, _acquire) = surface.dequeue_buffer();
//! let outcome = surface.queue_buffer(Fence::signaled())?;
//! surface.flip();
//! surface.on_present_display_completed();
//! println!("{:?} after {} flip(s)", outcome, surface.page_flip_count());
//! # Ok::<(), render_surface::SurfaceError>(())
//! ```

pub mod buffer;
pub mod composition;
pub mod config;
pub mod display_surface;
pub mod error;
pub mod fence;
pub mod frame;
pub mod native_window;
pub mod observer;
pub mod render_engine;
pub mod sim;
pub mod status;
pub mod surface;

// Re-export main types for easy access
pub use buffer::{BufferId, BufferUsage, Dataspace, GraphicBuffer, PixelFormat, Size};
pub use composition::{classify, CompositionBackend, CompositionType, DisplayId};
pub use config::SimConfig;
pub use display_surface::DisplaySurface;
pub use error::SurfaceError;
pub use fence::Fence;
pub use frame::FrameProducer;
pub use native_window::NativeWindow;
pub use observer::{SurfaceEvent, SurfaceObserver};
pub use render_engine::RenderEngine;
pub use status::{Status, StatusError};
pub use surface::{
    DisplayInfo, DisplayKind, FrameState, QueueOutcome, RenderSurface, RenderSurfaceCreationArgs,
};

// Re-export common error types
pub use anyhow::{Context, Error, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
pub const BUILD_DATE: &str = env!("BUILD_DATE");
