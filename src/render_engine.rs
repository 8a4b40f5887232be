//! GPU render engine seam used to set up the viewport for client composition

#[cfg(test)]
use mockall::automock;

use crate::buffer::Rect;

/// Output orientation applied by the projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transform {
    #[default]
    Rot0,
    Rot90,
    Rot180,
    Rot270,
}

#[cfg_attr(test, automock)]
pub trait RenderEngine: Send + Sync {
    fn set_viewport_and_projection(
        &self,
        width: i32,
        height: i32,
        source_crop: Rect,
        orientation: Transform,
    );
}
