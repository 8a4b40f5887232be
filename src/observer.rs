//! Observability for the frame path
//!
//! [`RenderSurface`](crate::surface::RenderSurface) reports every anomaly and
//! every buffer hand-off as a [`SurfaceEvent`] instead of logging inline.
//! [`LogObserver`] forwards events to the `log` facade; [`RecordingObserver`]
//! keeps them for inspection in tests and in the simulator summary.

use log::{error, log, Level};
use parking_lot::Mutex;
use std::fmt;

use crate::buffer::{BufferId, BufferUsage, Dataspace};
use crate::composition::CompositionType;
use crate::status::StatusError;

/// Something the render surface wants the outside world to know about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    ConnectFailed(StatusError),
    DisconnectFailed(StatusError),
    FormatRejected(StatusError),
    UsageRejected {
        usage: BufferUsage,
        protected: bool,
        status: StatusError,
    },
    DataspaceRejected {
        dataspace: Dataspace,
        status: StatusError,
    },
    PrepareFailed(StatusError),
    CompositionPrepared(CompositionType),
    Dequeued(BufferId),
    DequeueFailed(StatusError),
    /// A second dequeue overwrote a buffer that was never queued
    BufferClobbered { previous: BufferId },
    /// Queue found no dequeued buffer and is dequeuing one itself
    ScratchDequeue,
    NoBufferReady,
    Queued(BufferId),
    QueueFailed {
        buffer: BufferId,
        status: StatusError,
    },
    Cancelled(BufferId),
    CancelFailed {
        buffer: BufferId,
        status: StatusError,
    },
    /// Hand-off failed on a physical display; the process must go down
    Escalated(StatusError),
    AdvanceFrameFailed(StatusError),
}

impl SurfaceEvent {
    /// Whether the event reports a failure
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            SurfaceEvent::ConnectFailed(_)
                | SurfaceEvent::DisconnectFailed(_)
                | SurfaceEvent::FormatRejected(_)
                | SurfaceEvent::UsageRejected { .. }
                | SurfaceEvent::DataspaceRejected { .. }
                | SurfaceEvent::PrepareFailed(_)
                | SurfaceEvent::DequeueFailed(_)
                | SurfaceEvent::NoBufferReady
                | SurfaceEvent::QueueFailed { .. }
                | SurfaceEvent::CancelFailed { .. }
                | SurfaceEvent::Escalated(_)
                | SurfaceEvent::AdvanceFrameFailed(_)
        )
    }

    /// Level [`LogObserver`] reports the event at
    pub fn log_level(&self) -> Level {
        match self {
            SurfaceEvent::BufferClobbered { .. } => Level::Warn,
            SurfaceEvent::ScratchDequeue => Level::Info,
            e if e.is_error() => Level::Error,
            _ => Level::Debug,
        }
    }
}

impl fmt::Display for SurfaceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceEvent::ConnectFailed(s) => {
                write!(f, "Unable to connect buffer queue producer: {}", s.code())
            }
            SurfaceEvent::DisconnectFailed(s) => {
                write!(f, "Unable to disconnect buffer queue producer: {}", s.code())
            }
            SurfaceEvent::FormatRejected(s) => {
                write!(f, "Unable to set buffer queue format to RGBA8888: {}", s.code())
            }
            SurfaceEvent::UsageRejected {
                usage,
                protected,
                status,
            } => write!(
                f,
                "Unable to set usage bits {:#x} (protected={}): {}",
                usage.bits(),
                protected,
                status.code()
            ),
            SurfaceEvent::DataspaceRejected { dataspace, status } => {
                write!(f, "Unable to set dataspace {:?}: {}", dataspace, status.code())
            }
            SurfaceEvent::PrepareFailed(s) => write!(f, "Hardware prepare failed: {}", s.code()),
            SurfaceEvent::CompositionPrepared(c) => write!(f, "Prepared {} frame", c),
            SurfaceEvent::Dequeued(id) => write!(f, "Dequeued buffer {}", id),
            SurfaceEvent::DequeueFailed(s) => {
                write!(f, "dequeueBuffer failed with error: {}", s.code())
            }
            SurfaceEvent::BufferClobbered { previous } => {
                write!(f, "Clobbering a non-null buffer {}", previous)
            }
            SurfaceEvent::ScratchDequeue => write!(
                f,
                "Queueing a client composited buffer without one previously dequeued, dequeuing a scratch buffer"
            ),
            SurfaceEvent::NoBufferReady => write!(f, "No buffer is ready"),
            SurfaceEvent::Queued(id) => write!(f, "Queued buffer {}", id),
            SurfaceEvent::QueueFailed { buffer, status } => write!(
                f,
                "Error when queueing buffer {}: {}",
                buffer,
                status.code()
            ),
            SurfaceEvent::Cancelled(id) => write!(f, "Cancelled buffer {}", id),
            SurfaceEvent::CancelFailed { buffer, status } => write!(
                f,
                "Error when cancelling buffer {}: {}",
                buffer,
                status.code()
            ),
            SurfaceEvent::Escalated(s) => {
                write!(f, "queueBuffer failed on a physical display with error: {}", s.code())
            }
            SurfaceEvent::AdvanceFrameFailed(s) => {
                write!(f, "Failed pushing new frame to HWC: {}", s.code())
            }
        }
    }
}

/// Receives events from one or more render surfaces
pub trait SurfaceObserver: Send + Sync {
    fn on_event(&self, display: &str, event: &SurfaceEvent);
}

/// Default observer: routes events to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl SurfaceObserver for LogObserver {
    fn on_event(&self, display: &str, event: &SurfaceEvent) {
        match event {
            SurfaceEvent::Escalated(_) => error!("💥 [{}] {}", display, event),
            _ => log!(event.log_level(), "[{}] {}", display, event),
        }
    }
}

/// Keeps every event in memory, in arrival order
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<(String, SurfaceEvent)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events without display names
    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.events.lock().iter().map(|(_, e)| e.clone()).collect()
    }

    /// Events recorded for one display
    pub fn events_for(&self, display: &str) -> Vec<SurfaceEvent> {
        self.events
            .lock()
            .iter()
            .filter(|(d, _)| d == display)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&SurfaceEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|(_, e)| predicate(e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl SurfaceObserver for RecordingObserver {
    fn on_event(&self, display: &str, event: &SurfaceEvent) {
        self.events.lock().push((display.to_string(), event.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_observer_keeps_order_and_display() {
        let observer = RecordingObserver::new();
        observer.on_event("a", &SurfaceEvent::ScratchDequeue);
        observer.on_event("b", &SurfaceEvent::NoBufferReady);
        observer.on_event("a", &SurfaceEvent::Dequeued(BufferId(3)));

        assert_eq!(
            observer.events_for("a"),
            vec![SurfaceEvent::ScratchDequeue, SurfaceEvent::Dequeued(BufferId(3))]
        );
        assert_eq!(observer.count(|e| e.is_error()), 1);

        observer.clear();
        assert!(observer.events().is_empty());
    }

    #[test]
    fn anomalies_that_are_not_failures() {
        assert!(!SurfaceEvent::ScratchDequeue.is_error());
        assert!(!SurfaceEvent::BufferClobbered { previous: BufferId(1) }.is_error());
        assert!(SurfaceEvent::Escalated(StatusError::DeadObject).is_error());
    }

    #[test]
    fn event_text_carries_native_code() {
        let text = SurfaceEvent::AdvanceFrameFailed(StatusError::NoInit).to_string();
        assert!(text.contains("-19"));
    }

    #[test]
    fn log_levels_follow_severity() {
        let errors = [
            SurfaceEvent::ConnectFailed(StatusError::NoInit),
            SurfaceEvent::DequeueFailed(StatusError::TimedOut),
            SurfaceEvent::NoBufferReady,
            SurfaceEvent::QueueFailed {
                buffer: BufferId(1),
                status: StatusError::DeadObject,
            },
            SurfaceEvent::Escalated(StatusError::DeadObject),
            SurfaceEvent::AdvanceFrameFailed(StatusError::BadValue),
        ];
        for event in &errors {
            assert_eq!(event.log_level(), Level::Error, "{:?}", event);
        }

        assert_eq!(
            SurfaceEvent::BufferClobbered { previous: BufferId(2) }.log_level(),
            Level::Warn
        );
        assert_eq!(SurfaceEvent::ScratchDequeue.log_level(), Level::Info);
        assert_eq!(SurfaceEvent::Queued(BufferId(3)).log_level(), Level::Debug);
        assert_eq!(SurfaceEvent::Cancelled(BufferId(4)).log_level(), Level::Debug);
        assert_eq!(
            SurfaceEvent::CompositionPrepared(CompositionType::Mixed).log_level(),
            Level::Debug
        );
    }
}
