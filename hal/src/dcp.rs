//! # Display Co-Processor Interface
//!
//! The DCP firmware owns timing negotiation and composition. The bootloader
//! talks to it through a small command set: power, hot-plug status, mode
//! enumeration, mode programming and a single-layer swap.
//!
//! The RPC encoding and shared-memory queues live behind [`DcpCommands`];
//! this module only fixes the shape of the data crossing that boundary.

use crate::iommu::IommuContext;
use crate::{DeviceAddr, HalError, HalResult};
use core::fmt;
use static_assertions::{assert_impl_all, const_assert};

// =============================================================================
// FIXED-POINT REFRESH RATE
// =============================================================================

/// Refresh rate in unsigned 16.16 fixed point
///
/// Ordering and equality are on the raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Fps(u32);

impl Fps {
    /// Number of fractional bits
    pub const FRAC_BITS: u32 = 16;

    /// Zero refresh rate
    pub const ZERO: Self = Self(0);

    /// Create from the raw fixed-point value
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Create from a whole number of hertz
    #[inline]
    pub const fn from_hz(hz: u32) -> Self {
        Self(hz << Self::FRAC_BITS)
    }

    /// Raw fixed-point value
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Integer part in hertz
    #[inline]
    pub const fn whole(self) -> u32 {
        self.0 >> Self::FRAC_BITS
    }

    /// Fractional part rounded to hundredths
    ///
    /// Can yield 100 for fractions just below one.
    #[inline]
    pub const fn hundredths(self) -> u32 {
        ((self.0 & 0xffff) * 100 + 0x7fff) >> Self::FRAC_BITS
    }

    /// Distance between two rates in raw units
    #[inline]
    pub const fn abs_diff(self, other: Fps) -> u32 {
        self.0.abs_diff(other.0)
    }
}

impl fmt::Display for Fps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.whole(), self.hundredths())
    }
}

// =============================================================================
// MODES
// =============================================================================

/// Display timing mode as reported by firmware or requested by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimingMode {
    /// Mode is usable
    pub valid: bool,
    /// Horizontal resolution
    pub width: u32,
    /// Vertical resolution
    pub height: u32,
    /// Refresh rate
    pub fps: Fps,
}

impl TimingMode {
    /// All-zero, invalid mode ("no preference")
    pub const NONE: Self = Self {
        valid: false,
        width: 0,
        height: 0,
        fps: Fps::ZERO,
    };

    /// Create a valid mode
    pub const fn new(width: u32, height: u32, fps: Fps) -> Self {
        Self {
            valid: true,
            width,
            height,
            fps,
        }
    }

    /// Check whether both modes have the same resolution
    #[inline]
    pub const fn same_size(&self, other: &TimingMode) -> bool {
        self.width == other.width && self.height == other.height
    }
}

impl fmt::Display for TimingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "valid={} {}x{} {} Hz",
            u8::from(self.valid),
            self.width,
            self.height,
            self.fps
        )
    }
}

/// Color mode as reported by firmware
///
/// `colorimetry`, `encoding` and `eotf` are firmware enumerations compared by
/// raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorMode {
    /// Mode is usable
    pub valid: bool,
    /// Bits per pixel
    pub bpp: u32,
    /// Colorimetry
    pub colorimetry: i32,
    /// Pixel encoding
    pub encoding: i32,
    /// Electro-optical transfer function
    pub eotf: i32,
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "valid={} colorimetry={} eotf={} encoding={} bpp={}",
            u8::from(self.valid),
            self.colorimetry,
            self.eotf,
            self.encoding,
            self.bpp
        )
    }
}

// =============================================================================
// SURFACES
// =============================================================================

/// Maximum number of planes in one layer
pub const MAX_PLANES: usize = 3;

const_assert!(MAX_PLANES >= 1);

/// Surface pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SurfaceFormat {
    /// 8-bit BGRA
    Bgra = 1,
    /// 8-bit RGBA
    Rgba = 3,
    /// Packed 10-bit per channel, 30 bits per pixel
    W30r = 9,
}

impl SurfaceFormat {
    /// Bytes occupied by one pixel
    pub const fn bytes_per_pixel(self) -> u32 {
        4
    }

    /// Meaningful color depth in bits
    pub const fn depth(self) -> u32 {
        match self {
            SurfaceFormat::Bgra | SurfaceFormat::Rgba => 32,
            SurfaceFormat::W30r => 30,
        }
    }
}

/// Plane addressing layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AddrFormat {
    /// Linear, row after row
    Planar = 1,
    /// GPU tiled
    Tiled = 2,
}

/// Transfer function tag of a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Eotf {
    /// Standard dynamic range gamma
    GammaSdr = 1,
    /// High dynamic range gamma
    GammaHdr = 2,
}

/// Layer transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Transform {
    /// Identity
    None = 0,
}

/// Firmware colorspace tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Colorspace(pub u32);

impl Colorspace {
    /// Colorspace used for the boot framebuffer
    pub const BOOT: Self = Self(2);
}

/// One memory surface of a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneDescriptor {
    /// Device address of the first byte, in the co-processor's view
    pub addr: DeviceAddr,
    /// Bytes per row
    pub stride: u32,
    /// Addressing layout
    pub addr_format: AddrFormat,
}

/// A composited layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    /// Planes in firmware order
    pub planes: heapless::Vec<PlaneDescriptor, MAX_PLANES>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel format
    pub surface_format: SurfaceFormat,
    /// Colorspace tag
    pub colorspace: Colorspace,
    /// Transfer function tag
    pub eotf: Eotf,
    /// Transform tag
    pub transform: Transform,
}

impl Layer {
    /// Create a layer with no planes
    pub const fn new(width: u32, height: u32, surface_format: SurfaceFormat) -> Self {
        Self {
            planes: heapless::Vec::new(),
            width,
            height,
            surface_format,
            colorspace: Colorspace::BOOT,
            eotf: Eotf::GammaSdr,
            transform: Transform::None,
        }
    }

    /// Append a plane
    pub fn push_plane(&mut self, plane: PlaneDescriptor) -> HalResult<()> {
        self.planes.push(plane).map_err(|_| HalError::OutOfMemory)
    }

    /// First plane, if any
    #[inline]
    pub fn primary(&self) -> Option<&PlaneDescriptor> {
        self.planes.first()
    }
}

/// Source or destination rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Horizontal offset
    pub x: u32,
    /// Vertical offset
    pub y: u32,
}

impl Rect {
    /// Rectangle anchored at the origin
    pub const fn full(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            x: 0,
            y: 0,
        }
    }
}

// =============================================================================
// COMMAND INTERFACE
// =============================================================================

/// Result of a hot-plug status query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HotplugStatus {
    /// A display is attached
    pub connected: bool,
    /// Number of timing modes the firmware enumerated
    pub timing_count: usize,
    /// Number of color modes the firmware enumerated
    pub color_count: usize,
}

impl HotplugStatus {
    /// Display attached and both mode lists populated
    #[inline]
    pub const fn is_ready(&self) -> bool {
        self.connected && self.timing_count != 0 && self.color_count != 0
    }
}

/// Swap transaction identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SwapId(pub u32);

/// Hardware nodes a co-processor session is started from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionNodes<'a> {
    /// Co-processor node
    pub dcp: &'a str,
    /// IOMMU node of the co-processor itself
    pub dcp_iommu: &'a str,
    /// IOMMU node of the display engine
    pub display_iommu: &'a str,
}

/// Co-processor command interface
///
/// All calls block until the firmware answers.
pub trait DcpCommands {
    /// Switch display power
    fn set_power(&mut self, on: bool) -> HalResult<()>;

    /// Query hot-plug state and candidate mode counts
    fn hotplug(&mut self) -> HalResult<HotplugStatus>;

    /// Fetch the enumerated timing modes
    fn timing_modes(&mut self) -> HalResult<&[TimingMode]>;

    /// Fetch the enumerated color modes
    fn color_modes(&mut self) -> HalResult<&[ColorMode]>;

    /// Program a timing + color mode pair
    fn set_mode(&mut self, timing: &TimingMode, color: &ColorMode) -> HalResult<()>;

    /// Open a swap transaction
    fn swap_begin(&mut self) -> HalResult<SwapId>;

    /// Place `layer` at `index` in the open swap
    fn swap_set_layer(&mut self, index: u32, layer: &Layer, src: &Rect, dst: &Rect)
        -> HalResult<()>;

    /// Commit the open swap
    fn swap_end(&mut self) -> HalResult<()>;

    /// Close the interface
    fn shutdown(self)
    where
        Self: Sized;
}

/// Initialized connection to the co-processor
///
/// Owns the two IOMMU contexts the framebuffer must be visible in.
pub trait DcpSession {
    /// IOMMU context type
    type Iommu: IommuContext;

    /// Command interface type
    type Commands: DcpCommands;

    /// Display-engine context
    fn display_iommu(&self) -> &Self::Iommu;

    /// Co-processor context
    fn dcp_iommu(&self) -> &Self::Iommu;

    /// Both contexts, display engine first
    fn iommus_mut(&mut self) -> (&mut Self::Iommu, &mut Self::Iommu);

    /// Open the command interface
    fn open_commands(&mut self) -> HalResult<Self::Commands>;

    /// Stop the session
    fn shutdown(self)
    where
        Self: Sized;
}

assert_impl_all!(TimingMode: Copy, Send, Sync);
assert_impl_all!(ColorMode: Copy, Send, Sync);
assert_impl_all!(Layer: Clone, Send, Sync);
