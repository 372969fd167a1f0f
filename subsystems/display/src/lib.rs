//! # Helix Display Subsystem
//!
//! Brings up the built-in or attached display through the display
//! co-processor (DCP) before any OS runs:
//!
//! 1. start a co-processor session and make the boot framebuffer visible to
//!    both the display engine and the co-processor ([`vram`])
//! 2. power the display and poll hot-plug until the firmware has enumerated
//!    modes
//! 3. pick a timing and a color mode ([`select`]), honouring an optional user
//!    request ([`mode`])
//! 4. program the mode, swap in a single full-screen layer and hand the new
//!    geometry to later boot stages ([`manager`])
//!
//! ## Outcomes
//!
//! Bring-up has three outcomes, mirrored by the `i32` entry points:
//!
//! - `1`: a mode was committed
//! - `0`: nothing to do (already initialized, no display, status unavailable)
//! - `< 0`: hard failure while starting, programming or swapping
//!
//! Everything is synchronous and single threaded. Callers running in a
//! concurrent environment must serialize access to a [`DisplayManager`].

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

#[cfg(test)]
extern crate std;

pub mod config;
pub mod manager;
pub mod mode;
pub mod select;
pub mod vram;

#[cfg(test)]
mod mock;

pub use config::DisplayConfig;
pub use manager::{BringupState, DisplayManager};
pub use mode::parse_requested_mode;

use core::fmt;
use helix_hal::dcp::{ColorMode, DcpSession, SessionNodes, SwapId, TimingMode};
use helix_hal::delay::Delay;
use helix_hal::firmware::{BootHandoff, DeviceTree};
use helix_hal::{DeviceAddr, HalError, HalResult, PhysAddr};

/// Display subsystem result type
pub type DisplayResult<T> = Result<T, DisplayError>;

/// Hard failures of the bring-up sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayError {
    /// The co-processor session could not be started
    SessionStart(HalError),
    /// The co-processor command interface could not be opened
    InterfaceInit(HalError),
    /// The reserved framebuffer region is not described by the hardware tree
    VramNotFound(HalError),
    /// The reserved framebuffer region is not the boot framebuffer
    VramMismatch {
        /// Base of the reserved region
        vram: PhysAddr,
        /// Base of the boot framebuffer
        framebuffer: PhysAddr,
    },
    /// No free device address range for the framebuffer
    IovaUnavailable(HalError),
    /// The two address searches disagreed
    IovaMismatch {
        /// Address found for the co-processor
        dcp: DeviceAddr,
        /// Address found for the display engine
        display: DeviceAddr,
    },
    /// Mapping the framebuffer into a context failed
    MapFailed {
        /// Context that refused the mapping
        context: &'static str,
        /// Underlying error
        error: HalError,
    },
    /// Display power-on was refused
    PowerOn(HalError),
    /// Timing modes could not be fetched
    TimingModes(HalError),
    /// Color modes could not be fetched
    ColorModes(HalError),
    /// The chosen mode could not be programmed
    SetMode(HalError),
    /// The swap could not be opened
    SwapBegin(HalError),
    /// The framebuffer layer was refused
    SetLayer(HalError),
    /// The swap could not be committed
    SwapEnd(HalError),
    /// The layer has no room for another plane
    LayerFull,
}

impl DisplayError {
    /// Negative status code for C-style callers
    pub const fn code(self) -> i32 {
        match self {
            DisplayError::PowerOn(error) => error.status(),
            _ => -1,
        }
    }
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::SessionStart(e) => write!(f, "failed to initialize DCP: {}", e),
            DisplayError::InterfaceInit(e) => {
                write!(f, "failed to initialize DCP command interface: {}", e)
            }
            DisplayError::VramNotFound(e) => write!(f, "vram region unavailable: {}", e),
            DisplayError::VramMismatch { vram, framebuffer } => write!(
                f,
                "vram {:#x} does not match boot framebuffer {:#x}",
                vram, framebuffer
            ),
            DisplayError::IovaUnavailable(e) => write!(f, "no IOVA for framebuffer: {}", e),
            DisplayError::IovaMismatch { dcp, display } => write!(
                f,
                "IOVA mismatch for fb between dcp ({:#010x}) and disp0 ({:#010x})",
                dcp, display
            ),
            DisplayError::MapFailed { context, error } => {
                write!(f, "failed to map fb to {}: {}", context, error)
            }
            DisplayError::PowerOn(e) => write!(f, "failed to set power: {}", e),
            DisplayError::TimingModes(e) => write!(f, "failed to get timing modes: {}", e),
            DisplayError::ColorModes(e) => write!(f, "failed to get color modes: {}", e),
            DisplayError::SetMode(e) => write!(f, "failed to set mode: {}", e),
            DisplayError::SwapBegin(e) => write!(f, "failed to start swap: {}", e),
            DisplayError::SetLayer(e) => write!(f, "failed to set layer: {}", e),
            DisplayError::SwapEnd(e) => write!(f, "failed to complete swap: {}", e),
            DisplayError::LayerFull => write!(f, "layer plane capacity exceeded"),
        }
    }
}

/// Successful outcome of a bring-up request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureStatus {
    /// A mode was programmed and the framebuffer swapped in
    Committed {
        /// Identifier of the committed swap
        swap_id: SwapId,
        /// Programmed timing mode
        timing: TimingMode,
        /// Programmed color mode
        color: ColorMode,
    },
    /// The previous stage already configured the display
    AlreadyInitialized,
    /// No display attached, or it never reported any modes
    NoDisplay,
    /// The last hot-plug status query failed
    StatusUnavailable,
}

impl ConfigureStatus {
    /// `1` when committed, `0` otherwise
    pub const fn code(self) -> i32 {
        match self {
            ConfigureStatus::Committed { .. } => 1,
            _ => 0,
        }
    }

    /// Check whether a mode was committed
    pub const fn is_committed(&self) -> bool {
        matches!(self, ConfigureStatus::Committed { .. })
    }
}

/// Platform services the display subsystem depends on
///
/// Aggregates the collaborators of the bring-up stage: session start, the
/// hardware tree, busy-wait delays and the boot-argument handoff.
pub trait DisplayPlatform: Delay + BootHandoff {
    /// Co-processor session type
    type Session: DcpSession;

    /// Hardware tree type
    type Tree: DeviceTree;

    /// Start a co-processor session from the given nodes
    fn start_session(&mut self, nodes: &SessionNodes<'_>) -> HalResult<Self::Session>;

    /// Hardware tree handed over by the previous stage
    fn device_tree(&self) -> &Self::Tree;
}
