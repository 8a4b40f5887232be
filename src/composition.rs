//! Composition classification and the hardware composer seam

#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::status::Status;

/// Hardware composer identity of a display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DisplayId(pub u64);

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which path produced the frame the sink is about to consume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositionType {
    /// Some layers drawn by the GPU, others scanned out by hardware
    Mixed,
    /// Everything drawn by the GPU into the client target
    GpuOnly,
    /// Everything composited by hardware, or nothing to draw at all
    HardwareOnly,
}

impl CompositionType {
    /// Whether this frame needs a client target buffer from the GPU
    pub fn needs_client_target(&self) -> bool {
        matches!(self, CompositionType::Mixed | CompositionType::GpuOnly)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompositionType::Mixed => "MIXED",
            CompositionType::GpuOnly => "GPU",
            CompositionType::HardwareOnly => "HWC",
        }
    }
}

impl fmt::Display for CompositionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derives the frame's composition type from the backend's two flags.
///
/// A frame with neither kind of work (screen turning off) still goes through
/// a prepare/present cycle and is reported as hardware-only.
pub fn classify(has_client_work: bool, has_device_work: bool) -> CompositionType {
    match (has_client_work, has_device_work) {
        (true, true) => CompositionType::Mixed,
        (true, false) => CompositionType::GpuOnly,
        (false, _) => CompositionType::HardwareOnly,
    }
}

/// Hardware composition backend shared by every display.
///
/// Queries take `Option<DisplayId>`; a display without a hardware id is
/// GPU-only, so implementations report client composition `true`, device
/// composition `false` and no flip request for `None`.
#[cfg_attr(test, automock)]
pub trait CompositionBackend: Send + Sync {
    /// Runs hardware-side layer assignment for the display
    fn prepare(&self, display: DisplayId) -> Status;

    fn has_client_composition(&self, display: Option<DisplayId>) -> bool;

    fn has_device_composition(&self, display: Option<DisplayId>) -> bool;

    /// Backend wants the client target flipped even without GPU layers
    fn has_flip_client_target_request(&self, display: Option<DisplayId>) -> bool;
}
