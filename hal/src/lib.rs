//! # Helix HAL - Hardware Abstraction Layer
//!
//! This crate defines the traits and value types the display bring-up stage
//! uses to talk to the platform. Platform code implements these traits; the
//! display subsystem only ever sees them.
//!
//! ## Layout
//!
//! - [`iommu`]: per-master address translation contexts (DARTs)
//! - [`firmware`]: hardware description lookup and the boot-argument handoff
//! - [`dcp`]: display co-processor session and command interface
//! - [`delay`]: synchronous busy-wait primitives
//!
//! Everything here is synchronous and allocation free. No call is expected
//! to be re-entered.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

#[cfg(test)]
extern crate std;

pub mod dcp;
pub mod delay;
pub mod firmware;
pub mod iommu;

use core::fmt;
use static_assertions::assert_eq_size;

/// Result type for HAL operations
pub type HalResult<T> = Result<T, HalError>;

/// Errors that can occur in HAL operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// The operation is not supported on this platform
    NotSupported,
    /// Invalid parameter provided
    InvalidParameter,
    /// The requested node or property does not exist
    NotFound,
    /// Hardware reported an error
    HardwareError,
    /// Resource is not available
    ResourceBusy,
    /// Operation timed out
    Timeout,
    /// Address is invalid or not aligned
    InvalidAddress,
    /// No free address range or slot left
    OutOfMemory,
    /// Feature not initialized
    NotInitialized,
    /// Firmware returned a negative status code
    Firmware(i32),
}

impl HalError {
    /// Negative status code for C-style callers
    pub const fn status(self) -> i32 {
        match self {
            HalError::Firmware(code) if code < 0 => code,
            HalError::Firmware(_) => -1,
            HalError::NotSupported => -2,
            HalError::InvalidParameter => -3,
            HalError::NotFound => -4,
            HalError::HardwareError => -5,
            HalError::ResourceBusy => -6,
            HalError::Timeout => -7,
            HalError::InvalidAddress => -8,
            HalError::OutOfMemory => -9,
            HalError::NotInitialized => -10,
        }
    }
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HalError::NotSupported => write!(f, "not supported"),
            HalError::InvalidParameter => write!(f, "invalid parameter"),
            HalError::NotFound => write!(f, "not found"),
            HalError::HardwareError => write!(f, "hardware error"),
            HalError::ResourceBusy => write!(f, "resource busy"),
            HalError::Timeout => write!(f, "timed out"),
            HalError::InvalidAddress => write!(f, "invalid address"),
            HalError::OutOfMemory => write!(f, "out of address space"),
            HalError::NotInitialized => write!(f, "not initialized"),
            HalError::Firmware(code) => write!(f, "firmware status {}", code),
        }
    }
}

/// Physical address type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct PhysAddr(u64);

impl PhysAddr {
    /// Create a new physical address
    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Add an offset to the address
    #[inline]
    pub const fn add(self, offset: u64) -> Self {
        Self(self.0 + offset)
    }
}

impl fmt::LowerHex for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Device-virtual address (IOVA)
///
/// Only meaningful inside one IOMMU context. The same value may translate to
/// different physical memory in another context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct DeviceAddr(u64);

impl DeviceAddr {
    /// The null device address, used as "no preference" search hint
    pub const NULL: Self = Self(0);

    /// Create a new device address
    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

}

impl fmt::LowerHex for DeviceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

assert_eq_size!(PhysAddr, u64);
assert_eq_size!(DeviceAddr, u64);
