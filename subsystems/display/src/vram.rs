//! # Framebuffer IOVA Coordination
//!
//! The boot framebuffer has to be reachable at the same device address from
//! the display engine and from the co-processor. Usually the previous stage
//! already mapped it for the display engine and that address is reused. On
//! platforms where it is left unmapped, the reserved `/vram` region is mapped
//! into both contexts here.
//!
//! A mapping is always established in both contexts or in neither.

use crate::{DisplayError, DisplayResult};
use helix_hal::dcp::DcpSession;
use helix_hal::firmware::DeviceTree;
use helix_hal::iommu::IommuContext;
use helix_hal::{DeviceAddr, HalError, PhysAddr};

/// How the framebuffer mapping came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingOrigin {
    /// The previous stage had already mapped it
    Preexisting,
    /// Mapped here, `size` bytes in both contexts
    Established {
        /// Mapped length in bytes
        size: u64,
    },
}

/// Device address of the framebuffer, valid in both contexts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferMapping {
    /// Device address
    pub iova: DeviceAddr,
    /// Origin of the mapping
    pub origin: MappingOrigin,
}

/// Find or create the framebuffer mapping
pub fn resolve_framebuffer<S, T>(
    session: &mut S,
    tree: &T,
    vram_node: &str,
    framebuffer: PhysAddr,
) -> DisplayResult<FramebufferMapping>
where
    S: DcpSession,
    T: DeviceTree + ?Sized,
{
    if let Some(iova) = session.display_iommu().reverse_lookup(framebuffer) {
        log::debug!("fb {:#x} already mapped at dva {:#x}", framebuffer, iova);
        return Ok(FramebufferMapping {
            iova,
            origin: MappingOrigin::Preexisting,
        });
    }

    log::debug!("fb {:#x} not mapped for the display engine, mapping vram", framebuffer);
    map_vram(session, tree, vram_node, framebuffer)
}

fn map_vram<S, T>(
    session: &mut S,
    tree: &T,
    vram_node: &str,
    framebuffer: PhysAddr,
) -> DisplayResult<FramebufferMapping>
where
    S: DcpSession,
    T: DeviceTree + ?Sized,
{
    let region = tree.region(vram_node, 0).map_err(|e| {
        match e {
            HalError::NotFound => log::error!("'{}' not found", vram_node),
            _ => log::error!("failed to read {}/reg: {}", vram_node, e),
        }
        DisplayError::VramNotFound(e)
    })?;

    if region.start != framebuffer {
        let error = DisplayError::VramMismatch {
            vram: region.start,
            framebuffer,
        };
        log::error!("{}", error);
        return Err(error);
    }

    let size = region.size;
    let dcp = session.dcp_iommu();

    let dcp_iova = dcp.find_free(DeviceAddr::NULL, size).map_err(|e| {
        log::error!("failed to find IOVA for fb of {:#08x} bytes (dcp): {}", size, e);
        DisplayError::IovaUnavailable(e)
    })?;

    // The display-engine address is searched in the co-processor's context
    // too, seeded with the first result. Both allocators are expected to
    // agree; the comparison below catches it if they ever do not.
    let display_iova = dcp.find_free(dcp_iova, size).map_err(|e| {
        log::error!("failed to find IOVA for fb of {:#08x} bytes (disp0): {}", size, e);
        DisplayError::IovaUnavailable(e)
    })?;

    if display_iova != dcp_iova {
        let error = DisplayError::IovaMismatch {
            dcp: dcp_iova,
            display: display_iova,
        };
        log::error!("{}", error);
        return Err(error);
    }

    #[cfg(feature = "verbose")]
    log::trace!("fb iova {:#x} agreed by both searches", dcp_iova);

    let (display, dcp) = session.iommus_mut();
    map_pair(display, dcp, dcp_iova, region.start, size)?;

    Ok(FramebufferMapping {
        iova: dcp_iova,
        origin: MappingOrigin::Established { size },
    })
}

/// Map one range into two contexts at the same device address
///
/// If the second mapping fails the first one is removed again, so on error
/// neither context holds the range.
pub fn map_pair<A, B>(
    first: &mut A,
    second: &mut B,
    iova: DeviceAddr,
    phys: PhysAddr,
    size: u64,
) -> DisplayResult<()>
where
    A: IommuContext + ?Sized,
    B: IommuContext + ?Sized,
{
    first.map(iova, phys, size).map_err(|error| {
        log::error!("failed to map fb to {}: {}", first.name(), error);
        DisplayError::MapFailed {
            context: first.name(),
            error,
        }
    })?;

    if let Err(error) = second.map(iova, phys, size) {
        log::error!("failed to map fb to {}: {}", second.name(), error);
        if let Err(undo) = first.unmap(iova, size) {
            log::warn!("failed to unmap fb from {}: {}", first.name(), undo);
        }
        return Err(DisplayError::MapFailed {
            context: second.name(),
            error,
        });
    }

    log::debug!(
        "fb {:#x} mapped at dva {:#x} in {} and {}",
        phys,
        iova,
        first.name(),
        second.name()
    );
    Ok(())
}
