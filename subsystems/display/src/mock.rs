//! Recording fakes of the platform collaborators.
//!
//! Everything the co-processor sees is recorded in one shared [`DcpState`] so a
//! test can script firmware answers up front and inspect the traffic after the
//! manager has consumed the session.

use crate::DisplayPlatform;
use core::cell::{Cell, RefCell};
use helix_hal::dcp::{
    ColorMode, DcpCommands, DcpSession, HotplugStatus, Layer, Rect, SessionNodes, SwapId,
    TimingMode,
};
use helix_hal::delay::Delay;
use helix_hal::firmware::{BootHandoff, BootVideo, DeviceTree};
use helix_hal::iommu::{IommuContext, MemoryRegion};
use helix_hal::{DeviceAddr, HalError, HalResult, PhysAddr};
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

// =============================================================================
// IOMMU
// =============================================================================

#[derive(Debug, Clone)]
pub struct MockIommu {
    pub name: &'static str,
    pub mappings: Vec<(DeviceAddr, PhysAddr, u64)>,
    pub free_script: RefCell<VecDeque<HalResult<DeviceAddr>>>,
    pub free_default: DeviceAddr,
    pub find_calls: Cell<usize>,
    pub fail_map: Option<HalError>,
    pub unmaps: usize,
}

impl MockIommu {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            mappings: Vec::new(),
            free_script: RefCell::new(VecDeque::new()),
            free_default: DeviceAddr::new(0xa000_0000),
            find_calls: Cell::new(0),
            fail_map: None,
            unmaps: 0,
        }
    }

    /// Pretend an earlier stage left a mapping behind
    pub fn seed(&mut self, iova: DeviceAddr, phys: PhysAddr, size: u64) {
        self.mappings.push((iova, phys, size));
    }

    pub fn script_free(&self, result: HalResult<DeviceAddr>) {
        self.free_script.borrow_mut().push_back(result);
    }

    pub fn is_mapped(&self, iova: DeviceAddr, phys: PhysAddr, size: u64) -> bool {
        self.mappings.contains(&(iova, phys, size))
    }
}

impl IommuContext for MockIommu {
    fn name(&self) -> &'static str {
        self.name
    }

    fn map(&mut self, iova: DeviceAddr, phys: PhysAddr, size: u64) -> HalResult<()> {
        if let Some(error) = self.fail_map {
            return Err(error);
        }
        self.mappings.push((iova, phys, size));
        Ok(())
    }

    fn unmap(&mut self, iova: DeviceAddr, size: u64) -> HalResult<()> {
        self.unmaps += 1;
        let before = self.mappings.len();
        self.mappings.retain(|&(i, _, s)| !(i == iova && s == size));
        if self.mappings.len() == before {
            return Err(HalError::NotFound);
        }
        Ok(())
    }

    fn find_free(&self, _hint: DeviceAddr, _size: u64) -> HalResult<DeviceAddr> {
        self.find_calls.set(self.find_calls.get() + 1);
        self.free_script
            .borrow_mut()
            .pop_front()
            .unwrap_or(Ok(self.free_default))
    }

    fn reverse_lookup(&self, phys: PhysAddr) -> Option<DeviceAddr> {
        self.mappings
            .iter()
            .find(|&&(_, p, _)| p == phys)
            .map(|&(iova, _, _)| iova)
    }
}

// =============================================================================
// DEVICE TREE
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct MockTree {
    pub regions: Vec<(&'static str, MemoryRegion)>,
}

impl MockTree {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_region(path: &'static str, region: MemoryRegion) -> Self {
        Self {
            regions: std::vec![(path, region)],
        }
    }
}

impl DeviceTree for MockTree {
    fn region(&self, path: &str, index: usize) -> HalResult<MemoryRegion> {
        self.regions
            .iter()
            .filter(|(p, _)| *p == path)
            .nth(index)
            .map(|&(_, region)| region)
            .ok_or(HalError::NotFound)
    }
}

// =============================================================================
// CO-PROCESSOR
// =============================================================================

/// Firmware script and traffic log shared by sessions and command handles
#[derive(Debug)]
pub struct DcpState {
    pub hotplug_script: VecDeque<HalResult<HotplugStatus>>,
    pub hotplug_default: HalResult<HotplugStatus>,
    pub hotplug_calls: usize,
    pub timing: Vec<TimingMode>,
    pub color: Vec<ColorMode>,

    pub start_error: Option<HalError>,
    pub open_error: Option<HalError>,
    pub power_error: Option<HalError>,
    pub timing_error: Option<HalError>,
    pub color_error: Option<HalError>,
    pub set_mode_error: Option<HalError>,
    pub swap_begin_error: Option<HalError>,
    pub set_layer_error: Option<HalError>,
    pub swap_end_error: Option<HalError>,

    pub next_swap_id: u32,
    pub sessions_started: usize,
    pub nodes: Vec<SessionNodes<'static>>,
    pub power: Vec<bool>,
    pub modes: Vec<(TimingMode, ColorMode)>,
    pub swaps_begun: usize,
    pub layers: Vec<(u32, Layer, Rect, Rect)>,
    pub swaps_ended: usize,
    pub events: Vec<&'static str>,
}

impl Default for DcpState {
    fn default() -> Self {
        Self {
            hotplug_script: VecDeque::new(),
            hotplug_default: Ok(HotplugStatus::default()),
            hotplug_calls: 0,
            timing: Vec::new(),
            color: Vec::new(),
            start_error: None,
            open_error: None,
            power_error: None,
            timing_error: None,
            color_error: None,
            set_mode_error: None,
            swap_begin_error: None,
            set_layer_error: None,
            swap_end_error: None,
            next_swap_id: 7,
            sessions_started: 0,
            nodes: Vec::new(),
            power: Vec::new(),
            modes: Vec::new(),
            swaps_begun: 0,
            layers: Vec::new(),
            swaps_ended: 0,
            events: Vec::new(),
        }
    }
}

fn fail_with(error: Option<HalError>) -> HalResult<()> {
    match error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

#[derive(Debug)]
pub struct MockCommands {
    state: Rc<RefCell<DcpState>>,
    timing: Vec<TimingMode>,
    color: Vec<ColorMode>,
}

impl DcpCommands for MockCommands {
    fn set_power(&mut self, on: bool) -> HalResult<()> {
        let mut state = self.state.borrow_mut();
        state.power.push(on);
        fail_with(state.power_error)
    }

    fn hotplug(&mut self) -> HalResult<HotplugStatus> {
        let mut state = self.state.borrow_mut();
        state.hotplug_calls += 1;
        let default = state.hotplug_default;
        state.hotplug_script.pop_front().unwrap_or(default)
    }

    fn timing_modes(&mut self) -> HalResult<&[TimingMode]> {
        {
            let state = self.state.borrow();
            fail_with(state.timing_error)?;
            self.timing = state.timing.clone();
        }
        Ok(&self.timing)
    }

    fn color_modes(&mut self) -> HalResult<&[ColorMode]> {
        {
            let state = self.state.borrow();
            fail_with(state.color_error)?;
            self.color = state.color.clone();
        }
        Ok(&self.color)
    }

    fn set_mode(&mut self, timing: &TimingMode, color: &ColorMode) -> HalResult<()> {
        let mut state = self.state.borrow_mut();
        fail_with(state.set_mode_error)?;
        state.modes.push((*timing, *color));
        Ok(())
    }

    fn swap_begin(&mut self) -> HalResult<SwapId> {
        let mut state = self.state.borrow_mut();
        fail_with(state.swap_begin_error)?;
        state.swaps_begun += 1;
        Ok(SwapId(state.next_swap_id))
    }

    fn swap_set_layer(
        &mut self,
        index: u32,
        layer: &Layer,
        src: &Rect,
        dst: &Rect,
    ) -> HalResult<()> {
        let mut state = self.state.borrow_mut();
        fail_with(state.set_layer_error)?;
        state.layers.push((index, layer.clone(), *src, *dst));
        Ok(())
    }

    fn swap_end(&mut self) -> HalResult<()> {
        let mut state = self.state.borrow_mut();
        fail_with(state.swap_end_error)?;
        state.swaps_ended += 1;
        Ok(())
    }

    fn shutdown(self) {
        self.state.borrow_mut().events.push("commands shutdown");
    }
}

#[derive(Debug)]
pub struct MockSession {
    pub display: MockIommu,
    pub dcp: MockIommu,
    pub state: Rc<RefCell<DcpState>>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::with_state(Rc::new(RefCell::new(DcpState::default())))
    }

    pub fn with_state(state: Rc<RefCell<DcpState>>) -> Self {
        Self {
            display: MockIommu::new("dart-disp0"),
            dcp: MockIommu::new("dart-dcp"),
            state,
        }
    }
}

impl DcpSession for MockSession {
    type Iommu = MockIommu;
    type Commands = MockCommands;

    fn display_iommu(&self) -> &MockIommu {
        &self.display
    }

    fn dcp_iommu(&self) -> &MockIommu {
        &self.dcp
    }

    fn iommus_mut(&mut self) -> (&mut MockIommu, &mut MockIommu) {
        (&mut self.display, &mut self.dcp)
    }

    fn open_commands(&mut self) -> HalResult<MockCommands> {
        fail_with(self.state.borrow().open_error)?;
        self.state.borrow_mut().events.push("commands open");
        Ok(MockCommands {
            state: Rc::clone(&self.state),
            timing: Vec::new(),
            color: Vec::new(),
        })
    }

    fn shutdown(self) {
        self.state.borrow_mut().events.push("session shutdown");
    }
}

// =============================================================================
// PLATFORM
// =============================================================================

/// The boot framebuffer every mock platform starts with
pub const FB_BASE: PhysAddr = PhysAddr::new(0x9_e000_0000);

/// Size of the reserved vram region
pub const FB_SIZE: u64 = 0x200_0000;

#[derive(Debug)]
pub struct MockPlatform {
    pub state: Rc<RefCell<DcpState>>,
    pub tree: MockTree,
    /// Template the IOMMU contexts of every new session are cloned from
    pub display_iommu: MockIommu,
    pub dcp_iommu: MockIommu,
    pub video: BootVideo,
    pub delays: Vec<u32>,
    pub reinit_count: usize,
    pub publish_count: usize,
    pub published: Vec<BootVideo>,
}

impl MockPlatform {
    /// Platform booted with the placeholder framebuffer already mapped for
    /// the display engine
    pub fn new() -> Self {
        let mut display_iommu = MockIommu::new("dart-disp0");
        display_iommu.seed(DeviceAddr::new(0x8000_0000), FB_BASE, FB_SIZE);

        Self {
            state: Rc::new(RefCell::new(DcpState::default())),
            tree: MockTree::with_region("/vram", MemoryRegion::new(FB_BASE, FB_SIZE)),
            display_iommu,
            dcp_iommu: MockIommu::new("dart-dcp"),
            video: BootVideo {
                base: FB_BASE,
                stride: 640 * 4,
                width: 640,
                height: 1136,
                depth: 32,
            },
            delays: Vec::new(),
            reinit_count: 0,
            publish_count: 0,
            published: Vec::new(),
        }
    }

    /// Firmware that reports a display after `attempt` queries
    pub fn with_display(attempt: usize, timing: Vec<TimingMode>, color: Vec<ColorMode>) -> Self {
        let platform = Self::new();
        {
            let mut state = platform.state.borrow_mut();
            for _ in 1..attempt {
                state.hotplug_script.push_back(Ok(HotplugStatus::default()));
            }
            state.hotplug_default = Ok(HotplugStatus {
                connected: true,
                timing_count: timing.len(),
                color_count: color.len(),
            });
            state.timing = timing;
            state.color = color;
        }
        platform
    }

    pub fn dcp(&self) -> std::cell::Ref<'_, DcpState> {
        self.state.borrow()
    }

    pub fn dcp_mut(&self) -> std::cell::RefMut<'_, DcpState> {
        self.state.borrow_mut()
    }
}

impl Delay for MockPlatform {
    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
    }
}

impl BootHandoff for MockPlatform {
    fn video(&self) -> BootVideo {
        self.video
    }

    fn set_video(&mut self, video: BootVideo) {
        self.video = video;
    }

    fn reinit_framebuffer(&mut self) {
        self.reinit_count += 1;
    }

    fn publish(&mut self) {
        self.publish_count += 1;
        self.published.push(self.video);
    }
}

impl DisplayPlatform for MockPlatform {
    type Session = MockSession;
    type Tree = MockTree;

    fn start_session(&mut self, nodes: &SessionNodes<'_>) -> HalResult<MockSession> {
        let mut state = self.state.borrow_mut();
        if let Some(error) = state.start_error {
            return Err(error);
        }
        state.sessions_started += 1;
        state.nodes.push(SessionNodes {
            dcp: leak(nodes.dcp),
            dcp_iommu: leak(nodes.dcp_iommu),
            display_iommu: leak(nodes.display_iommu),
        });
        state.events.push("session start");
        drop(state);

        Ok(MockSession {
            display: self.display_iommu.clone(),
            dcp: self.dcp_iommu.clone(),
            state: Rc::clone(&self.state),
        })
    }

    fn device_tree(&self) -> &MockTree {
        &self.tree
    }
}

fn leak(s: &str) -> &'static str {
    std::boxed::Box::leak(std::string::String::from(s).into_boxed_str())
}
