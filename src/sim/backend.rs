//! Scripted hardware composer

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::FaultPlan;
use crate::composition::{CompositionBackend, DisplayId};
use crate::status::{Status, StatusError};

/// Which layers a simulated display asks the GPU and hardware for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionPattern {
    /// Every frame is client composited
    #[default]
    Gpu,
    /// Every frame is device composited
    Hardware,
    /// Client and device layers every frame
    Mixed,
    /// Odd frames GPU, even frames hardware
    Alternate,
    /// Nothing to draw (screen off)
    Idle,
}

impl CompositionPattern {
    /// `(client, device)` flags for a 1-based frame number
    pub fn flags(&self, frame: u64) -> (bool, bool) {
        match self {
            CompositionPattern::Gpu => (true, false),
            CompositionPattern::Hardware => (false, true),
            CompositionPattern::Mixed => (true, true),
            CompositionPattern::Alternate if frame % 2 == 1 => (true, false),
            CompositionPattern::Alternate => (false, true),
            CompositionPattern::Idle => (false, false),
        }
    }
}

#[derive(Debug, Clone)]
struct DisplayScript {
    pattern: CompositionPattern,
    faults: FaultPlan,
    frame: u64,
    prepares: u64,
}

/// Composition backend driven by per-display patterns.
///
/// Each successful `prepare` advances that display to its next frame.
#[derive(Debug, Default)]
pub struct SimCompositionBackend {
    displays: Mutex<HashMap<DisplayId, DisplayScript>>,
}

impl SimCompositionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: DisplayId, pattern: CompositionPattern, faults: FaultPlan) {
        self.displays.lock().insert(
            id,
            DisplayScript {
                pattern,
                faults,
                frame: 0,
                prepares: 0,
            },
        );
    }

    /// Number of prepare calls seen for a display
    pub fn prepare_count(&self, id: DisplayId) -> u64 {
        self.displays.lock().get(&id).map_or(0, |s| s.prepares)
    }

    fn flags(&self, id: DisplayId) -> (bool, bool) {
        self.displays
            .lock()
            .get(&id)
            .map_or((false, false), |s| s.pattern.flags(s.frame.max(1)))
    }
}

impl CompositionBackend for SimCompositionBackend {
    fn prepare(&self, display: DisplayId) -> Status {
        let mut displays = self.displays.lock();
        let script = displays.get_mut(&display).ok_or(StatusError::BadValue)?;
        script.prepares += 1;
        if FaultPlan::hits(script.faults.fail_prepare_every, script.prepares) {
            return Err(StatusError::NoMemory);
        }
        script.frame += 1;
        Ok(())
    }

    fn has_client_composition(&self, display: Option<DisplayId>) -> bool {
        display.map_or(true, |id| self.flags(id).0)
    }

    fn has_device_composition(&self, display: Option<DisplayId>) -> bool {
        display.map_or(false, |id| self.flags(id).1)
    }

    fn has_flip_client_target_request(&self, display: Option<DisplayId>) -> bool {
        let Some(id) = display else {
            return false;
        };
        self.displays
            .lock()
            .get(&id)
            .map_or(false, |s| FaultPlan::hits(s.faults.flip_client_target_every, s.frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternate_pattern_switches_every_frame() {
        let p = CompositionPattern::Alternate;
        assert_eq!(p.flags(1), (true, false));
        assert_eq!(p.flags(2), (false, true));
        assert_eq!(p.flags(3), (true, false));
    }

    #[test]
    fn gpu_only_display_convention() {
        let backend = SimCompositionBackend::new();
        assert!(backend.has_client_composition(None));
        assert!(!backend.has_device_composition(None));
        assert!(!backend.has_flip_client_target_request(None));
    }

    #[test]
    fn prepare_advances_script_and_reports_unknown_display() {
        let backend = SimCompositionBackend::new();
        let id = DisplayId(1);
        assert_eq!(backend.prepare(id), Err(StatusError::BadValue));

        backend.register(id, CompositionPattern::Alternate, FaultPlan::default());
        backend.prepare(id).unwrap();
        assert!(backend.has_client_composition(Some(id)));
        backend.prepare(id).unwrap();
        assert!(backend.has_device_composition(Some(id)));
        assert!(!backend.has_client_composition(Some(id)));
        assert_eq!(backend.prepare_count(id), 2);
    }

    #[test]
    fn flip_request_follows_fault_plan() {
        let backend = SimCompositionBackend::new();
        let id = DisplayId(3);
        let faults = FaultPlan {
            flip_client_target_every: Some(2),
            ..FaultPlan::default()
        };
        backend.register(id, CompositionPattern::Hardware, faults);

        backend.prepare(id).unwrap();
        assert!(!backend.has_flip_client_target_request(Some(id)));
        backend.prepare(id).unwrap();
        assert!(backend.has_flip_client_target_request(Some(id)));
    }

    #[test]
    fn prepare_failures_are_injected() {
        let backend = SimCompositionBackend::new();
        let id = DisplayId(4);
        let faults = FaultPlan {
            fail_prepare_every: Some(1),
            ..FaultPlan::default()
        };
        backend.register(id, CompositionPattern::Gpu, faults);
        assert_eq!(backend.prepare(id), Err(StatusError::NoMemory));
    }
}
