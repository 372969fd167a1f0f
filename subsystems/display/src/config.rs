//! # Display Configuration
//!
//! Static knobs of the bring-up sequence. The defaults match the hardware
//! layout and timings the previous boot stage leaves behind.

use crate::select::{ColorLimits, TimingLimits};
use helix_hal::dcp::SessionNodes;

/// Display bring-up configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Co-processor node
    pub dcp_node: &'static str,
    /// IOMMU node of the co-processor
    pub dcp_iommu_node: &'static str,
    /// IOMMU node of the display engine
    pub display_iommu_node: &'static str,
    /// Node describing the reserved framebuffer memory
    pub vram_node: &'static str,
    /// Hot-plug status queries before giving up
    pub hotplug_retries: u32,
    /// Pause between two hot-plug queries
    pub hotplug_delay_ms: u32,
    /// Width of the placeholder framebuffer set up by the previous stage
    pub placeholder_width: u64,
    /// Height of the placeholder framebuffer set up by the previous stage
    pub placeholder_height: u64,
    /// Ceiling applied when ranking timing modes
    pub timing_limits: TimingLimits,
    /// Ceiling applied when ranking color modes
    pub color_limits: ColorLimits,
    /// Swap slot of the framebuffer layer
    pub swap_layer: u32,
}

impl DisplayConfig {
    /// Default configuration
    pub const fn new() -> Self {
        Self {
            dcp_node: "/arm-io/dcp",
            dcp_iommu_node: "/arm-io/dart-dcp",
            display_iommu_node: "/arm-io/dart-disp0",
            vram_node: "/vram",
            hotplug_retries: 20,
            hotplug_delay_ms: 100,
            placeholder_width: 640,
            placeholder_height: 1136,
            timing_limits: TimingLimits::new(),
            color_limits: ColorLimits::new(),
            swap_layer: 0,
        }
    }

    /// Nodes the co-processor session is started from
    pub const fn session_nodes(&self) -> SessionNodes<'static> {
        SessionNodes {
            dcp: self.dcp_node,
            dcp_iommu: self.dcp_iommu_node,
            display_iommu: self.display_iommu_node,
        }
    }

    /// Upper bound of the hot-plug wait in milliseconds
    pub const fn hotplug_budget_ms(&self) -> u32 {
        self.hotplug_retries.saturating_sub(1) * self.hotplug_delay_ms
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self::new()
    }
}
