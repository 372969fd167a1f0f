//! # IOMMU Abstraction
//!
//! Each bus master (the display engine, the co-processor) sits behind its own
//! translation context. A buffer is only visible to a master once it is mapped
//! into that master's context.

use crate::{DeviceAddr, HalResult, PhysAddr};

/// IOMMU context trait
///
/// One instance per translation domain.
pub trait IommuContext {
    /// Short name of the context, used in diagnostics
    fn name(&self) -> &'static str;

    /// Map `size` bytes of physical memory at `iova`
    fn map(&mut self, iova: DeviceAddr, phys: PhysAddr, size: u64) -> HalResult<()>;

    /// Remove the mapping of `size` bytes at `iova`
    fn unmap(&mut self, iova: DeviceAddr, size: u64) -> HalResult<()>;

    /// Search for a free range of `size` bytes, starting at `hint`
    fn find_free(&self, hint: DeviceAddr, size: u64) -> HalResult<DeviceAddr>;

    /// Find the device address `phys` is already mapped at, if any
    fn reverse_lookup(&self, phys: PhysAddr) -> Option<DeviceAddr>;
}

/// Physical memory region descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    /// Starting physical address
    pub start: PhysAddr,
    /// Size in bytes
    pub size: u64,
}

impl MemoryRegion {
    /// Create a new region
    pub const fn new(start: PhysAddr, size: u64) -> Self {
        Self { start, size }
    }
}
