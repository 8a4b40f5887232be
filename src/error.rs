//! Errors surfaced by the render surface
//!
//! Almost every failure in the frame path is logged and absorbed. The single
//! exception is a rejected hand-off on a physical display, which is returned
//! as [`SurfaceError::QueueFailedOnPrimary`] so the process supervisor can
//! turn it into a crash.

use thiserror::Error;

use crate::status::StatusError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The native window refused a queued buffer on a physical display.
    /// Continuing would deadlock the next dequeue.
    #[error("queueBuffer failed on display [{display}]: {status} ({})", .status.code())]
    QueueFailedOnPrimary { display: String, status: StatusError },

    #[error(transparent)]
    Status(#[from] StatusError),
}

impl SurfaceError {
    /// Whether the error must terminate the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, SurfaceError::QueueFailedOnPrimary { .. })
    }
}
