//! The native buffer queue a render surface produces into

#[cfg(test)]
use mockall::automock;

use crate::buffer::{BufferUsage, Dataspace, GraphicBuffer, PixelFormat};
use crate::fence::Fence;
use crate::status::{Status, StatusError};

/// Producer end of a display's buffer queue.
///
/// `dequeue_buffer` and `queue_buffer` may block on the consumer; callers run
/// them on the frame-production thread.
#[cfg_attr(test, automock)]
pub trait NativeWindow: Send {
    /// Connects the GPU producer API
    fn connect(&mut self) -> Status;

    fn disconnect(&mut self) -> Status;

    fn set_buffers_format(&mut self, format: PixelFormat) -> Status;

    /// Replaces the full usage mask
    fn set_usage(&mut self, usage: BufferUsage) -> Status;

    fn set_buffers_dataspace(&mut self, dataspace: Dataspace) -> Status;

    /// Hands out a free buffer plus the fence guarding its previous reader
    fn dequeue_buffer(&mut self) -> Result<(GraphicBuffer, Fence), StatusError>;

    /// Submits a rendered buffer; `fence` fires when rendering is done
    fn queue_buffer(&mut self, buffer: &GraphicBuffer, fence: Fence) -> Status;

    /// Returns a buffer to the queue without presenting it
    fn cancel_buffer(&mut self, buffer: &GraphicBuffer, fence: Fence) -> Status;

    fn format(&self) -> PixelFormat;

    /// Opaque handle used in dumps
    fn handle(&self) -> u64;
}
