//! Graphic buffers and the descriptors attached to them
//!
//! A [`GraphicBuffer`] is the exclusive handle to one slot of a native
//! buffer queue. It is deliberately not `Clone`: exactly one owner holds it
//! between dequeue and queue/cancel.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Width/height pair of a display or buffer, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// A size is valid when it describes a rectangle with positive area
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}]", self.width, self.height)
    }
}

/// Axis-aligned rectangle, right/bottom exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

impl From<Size> for Rect {
    fn from(size: Size) -> Self {
        Self {
            left: 0,
            top: 0,
            right: size.width,
            bottom: size.height,
        }
    }
}

/// Pixel formats a buffer queue can be configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum PixelFormat {
    /// 32-bit RGBA format
    RGBA8888 = 1,
    /// 32-bit RGBX format (X is padding)
    RGBX8888 = 2,
    /// 16-bit RGB format
    RGB565 = 4,
    /// 32-bit BGRA format
    BGRA8888 = 5,
}

impl PixelFormat {
    /// Get the number of bytes per pixel
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            PixelFormat::RGB565 => 2,
            PixelFormat::RGBA8888 | PixelFormat::RGBX8888 | PixelFormat::BGRA8888 => 4,
        }
    }

    /// Get format name
    pub fn name(&self) -> &'static str {
        match self {
            PixelFormat::RGBA8888 => "RGBA8888",
            PixelFormat::RGBX8888 => "RGBX8888",
            PixelFormat::RGB565 => "RGB565",
            PixelFormat::BGRA8888 => "BGRA8888",
        }
    }

    /// Native format code
    pub fn code(&self) -> u32 {
        *self as u32
    }
}

bitflags! {
    /// Usage bits requested from the buffer allocator.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u64 {
        /// CPU reads the buffer often
        const SW_READ_OFTEN = 0x0000_0003;
        /// The GPU renders into the buffer
        const HW_RENDER = 0x0000_0200;
        /// The display hardware scans the buffer out directly
        const HW_COMPOSER = 0x0000_0800;
        /// Buffer content must stay on a protected path
        const PROTECTED = 0x0000_4000;
    }
}

/// Color-space tag attached to queued buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataspace {
    #[default]
    Unknown,
    Srgb,
    SrgbLinear,
    DisplayP3,
    Bt2020,
}

/// Identity of a graphic buffer, stable for the buffer's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

impl BufferId {
    /// Allocates a process-unique id
    pub fn new_unique() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        BufferId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Exclusive handle to a dequeued graphic buffer
#[derive(Debug, PartialEq, Eq)]
pub struct GraphicBuffer {
    id: BufferId,
    width: u32,
    height: u32,
    stride: u32,
    format: PixelFormat,
    usage: BufferUsage,
}

impl GraphicBuffer {
    pub fn new(id: BufferId, width: u32, height: u32, format: PixelFormat, usage: BufferUsage) -> Self {
        Self {
            id,
            width,
            height,
            stride: width,
            format,
            usage,
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row length in pixels
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Total size in bytes of the pixel storage
    pub fn byte_len(&self) -> usize {
        self.stride as usize * self.height as usize * self.format.bytes_per_pixel() as usize
    }
}
