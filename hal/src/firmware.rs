//! # Firmware Interface Abstraction
//!
//! Hardware description lookup (the device tree handed over by the previous
//! boot stage) and the boot-argument block shared with later stages.

use crate::iommu::MemoryRegion;
use crate::{HalResult, PhysAddr};
use core::fmt;

/// Hardware description lookup
pub trait DeviceTree {
    /// Resolve `path` to the `index`-th entry of its `reg` property
    ///
    /// Fails with [`HalError::NotFound`](crate::HalError::NotFound) if the node
    /// is absent and [`HalError::InvalidParameter`](crate::HalError::InvalidParameter)
    /// if the property is missing or malformed.
    fn region(&self, path: &str, index: usize) -> HalResult<MemoryRegion>;
}

/// Active framebuffer description from the boot arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BootVideo {
    /// Physical address of the framebuffer
    pub base: PhysAddr,
    /// Bytes per row
    pub stride: u64,
    /// Width in pixels
    pub width: u64,
    /// Height in pixels
    pub height: u64,
    /// Bits per pixel (30 for the packed 10-bit format)
    pub depth: u64,
}

impl BootVideo {
    /// Check whether the geometry matches `width` x `height`
    pub const fn has_size(&self, width: u64, height: u64) -> bool {
        self.width == width && self.height == height
    }
}

impl fmt::Display for BootVideo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} stride={} depth={} @ {:#x}",
            self.width, self.height, self.stride, self.depth, self.base
        )
    }
}

/// Boot-argument handoff
///
/// The boot-argument block is owned by the bootloader. The display subsystem
/// reads the video record, updates it after a mode commit and republishes the
/// block for the next stage.
pub trait BootHandoff {
    /// Current video record
    fn video(&self) -> BootVideo;

    /// Replace the video record
    fn set_video(&mut self, video: BootVideo);

    /// Re-derive text/graphics output addressing from the video record
    fn reinit_framebuffer(&mut self);

    /// Copy the boot-argument block to the location read by the next stage
    fn publish(&mut self);
}
