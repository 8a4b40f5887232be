//! The presentation sink at the consumer end of a display's buffer queue

#[cfg(test)]
use mockall::automock;

use crate::composition::CompositionType;
use crate::fence::Fence;
use crate::status::Status;

/// Double or triple buffered consumer that feeds the display.
#[cfg_attr(test, automock)]
pub trait DisplaySurface: Send + Sync {
    fn begin_frame(&self, must_recompose: bool) -> Status;

    /// Tells the sink which path will produce this frame
    fn prepare_frame(&self, composition: CompositionType) -> Status;

    /// Pushes the latest queued client target towards the hardware
    fn advance_frame(&self) -> Status;

    /// The hardware committed the frame; the sink may rotate its buffers
    fn on_frame_committed(&self);

    fn resize_buffers(&self, width: i32, height: i32);

    /// Fence the GPU must wait on before writing the next client target
    fn client_target_acquire_fence(&self) -> Fence;

    fn dump_as_string(&self) -> String;
}
