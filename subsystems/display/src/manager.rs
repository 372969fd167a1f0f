//! # Display Bring-up Manager
//!
//! Owns the co-processor session and drives one bring-up attempt per
//! [`DisplayManager::configure`] call:
//!
//! ```text
//! Idle -> SessionStarted -> PoweredOn -> HotplugPolling -> ModesReady
//!      -> ModeChosen -> LayerSubmitted -> Committed
//! ```
//!
//! Any hard failure moves to [`BringupState::Failed`]. A display that never
//! shows up is not a failure: the manager stops in `HotplugPolling` and
//! reports [`ConfigureStatus::NoDisplay`].
//!
//! The session and its framebuffer mapping are created on first use and
//! reused by every later call until [`DisplayManager::shutdown`].

use crate::config::DisplayConfig;
use crate::mode::parse_requested_mode;
use crate::select::{choose_color_mode, choose_timing_mode};
use crate::vram::{self, FramebufferMapping};
use crate::{ConfigureStatus, DisplayError, DisplayPlatform, DisplayResult};
use bitflags::bitflags;
use core::fmt;
use helix_hal::dcp::{
    AddrFormat, DcpCommands, DcpSession, HotplugStatus, Layer, PlaneDescriptor, Rect,
    SurfaceFormat, TimingMode,
};
use helix_hal::delay::Delay;
use helix_hal::firmware::BootVideo;
use helix_hal::HalResult;

// =============================================================================
// STATE
// =============================================================================

/// Bring-up progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum BringupState {
    /// Nothing attempted yet
    #[default]
    Idle = 0,
    /// Session running and framebuffer mapped
    SessionStarted = 1,
    /// Display powered
    PoweredOn = 2,
    /// Waiting for the firmware to report a display
    HotplugPolling = 3,
    /// Candidate lists fetched
    ModesReady = 4,
    /// Timing and color mode chosen
    ModeChosen = 5,
    /// Framebuffer layer placed in an open swap
    LayerSubmitted = 6,
    /// Swap committed
    Committed = 7,
    /// Bring-up failed
    Failed = 255,
}

impl fmt::Display for BringupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BringupState::Idle => write!(f, "Idle"),
            BringupState::SessionStarted => write!(f, "Session Started"),
            BringupState::PoweredOn => write!(f, "Powered On"),
            BringupState::HotplugPolling => write!(f, "Hot-plug Polling"),
            BringupState::ModesReady => write!(f, "Modes Ready"),
            BringupState::ModeChosen => write!(f, "Mode Chosen"),
            BringupState::LayerSubmitted => write!(f, "Layer Submitted"),
            BringupState::Committed => write!(f, "Committed"),
            BringupState::Failed => write!(f, "Failed"),
        }
    }
}

bitflags! {
    /// Boot video fields changed by a mode commit
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GeometryChange: u8 {
        /// Bytes per row
        const STRIDE = 1 << 0;
        /// Width
        const WIDTH = 1 << 1;
        /// Height
        const HEIGHT = 1 << 2;
        /// Color depth
        const DEPTH = 1 << 3;
    }
}

impl GeometryChange {
    /// Fields that differ between two video records; the base is ignored
    pub fn between(old: &BootVideo, new: &BootVideo) -> Self {
        let mut change = Self::empty();
        change.set(Self::STRIDE, old.stride != new.stride);
        change.set(Self::WIDTH, old.width != new.width);
        change.set(Self::HEIGHT, old.height != new.height);
        change.set(Self::DEPTH, old.depth != new.depth);
        change
    }
}

// =============================================================================
// HOT-PLUG POLLING
// =============================================================================

/// Outcome of a hot-plug poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotplugPoll {
    /// Answer to the last query
    pub result: HalResult<HotplugStatus>,
    /// Queries issued
    pub attempts: u32,
    /// Time spent in delays
    pub waited_ms: u32,
}

/// Query hot-plug status until a display with modes shows up
///
/// Issues at most `retries` queries (at least one) with `delay_ms` between
/// two queries and no delay after the last. A failed query does not stop the
/// loop; only the answer to the last query is reported.
pub fn poll_hotplug<C, D>(
    commands: &mut C,
    delay: &mut D,
    retries: u32,
    delay_ms: u32,
) -> HotplugPoll
where
    C: DcpCommands + ?Sized,
    D: Delay + ?Sized,
{
    let retries = retries.max(1);
    let mut attempts = 0;
    let mut waited_ms = 0u32;

    loop {
        attempts += 1;
        let result = commands.hotplug();

        #[cfg(feature = "verbose")]
        log::trace!("hotplug attempt {}/{}: {:?}", attempts, retries, result);

        let ready = matches!(result, Ok(status) if status.is_ready());
        if ready || attempts == retries {
            return HotplugPoll {
                result,
                attempts,
                waited_ms,
            };
        }

        delay.delay_ms(delay_ms);
        waited_ms = waited_ms.saturating_add(delay_ms);
    }
}

// =============================================================================
// MANAGER
// =============================================================================

struct ActiveSession<S: DcpSession> {
    session: S,
    commands: S::Commands,
    framebuffer: FramebufferMapping,
}

/// Owned display bring-up context
pub struct DisplayManager<P: DisplayPlatform> {
    platform: P,
    config: DisplayConfig,
    active: Option<ActiveSession<P::Session>>,
    state: BringupState,
}

impl<P: DisplayPlatform> fmt::Debug for DisplayManager<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayManager")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("framebuffer", &self.framebuffer())
            .finish_non_exhaustive()
    }
}

impl<P: DisplayPlatform> DisplayManager<P> {
    /// Create a manager; no hardware is touched until first use
    pub const fn new(platform: P, config: DisplayConfig) -> Self {
        Self {
            platform,
            config,
            active: None,
            state: BringupState::Idle,
        }
    }

    /// Create a manager with the default configuration
    pub const fn with_defaults(platform: P) -> Self {
        Self::new(platform, DisplayConfig::new())
    }

    /// Current bring-up state
    pub const fn state(&self) -> BringupState {
        self.state
    }

    /// Active configuration
    pub const fn config(&self) -> &DisplayConfig {
        &self.config
    }

    /// Platform services
    pub const fn platform(&self) -> &P {
        &self.platform
    }

    /// Platform services
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Framebuffer mapping of the running session
    pub fn framebuffer(&self) -> Option<FramebufferMapping> {
        self.active.as_ref().map(|active| active.framebuffer)
    }

    /// Bring the display up, honouring an optional `WxH@FPS` request
    pub fn configure(&mut self, request: Option<&str>) -> DisplayResult<ConfigureStatus> {
        let wanted = parse_requested_mode(request);

        self.state = BringupState::Idle;
        let result = self.bring_up(&wanted);
        if result.is_err() {
            self.state = BringupState::Failed;
        }
        result
    }

    /// [`configure`](Self::configure) with the tri-state integer result
    pub fn configure_display(&mut self, request: Option<&str>) -> i32 {
        match self.configure(request) {
            Ok(status) => status.code(),
            Err(error) => error.code(),
        }
    }

    /// Bring the display up if the previous stage left only a placeholder
    pub fn init(&mut self) -> DisplayResult<ConfigureStatus> {
        let video = self.platform.video();

        if video.has_size(self.config.placeholder_width, self.config.placeholder_height) {
            log::info!("dummy framebuffer found, initializing display");
            self.configure(None)
        } else {
            log::info!(
                "display is already initialized ({}x{})",
                video.width,
                video.height
            );
            Ok(ConfigureStatus::AlreadyInitialized)
        }
    }

    /// [`init`](Self::init) with the tri-state integer result
    pub fn init_display(&mut self) -> i32 {
        match self.init() {
            Ok(status) => status.code(),
            Err(error) => error.code(),
        }
    }

    /// Close the command interface, then stop the session
    ///
    /// Does nothing if no session was started.
    pub fn shutdown(&mut self) {
        if let Some(active) = self.active.take() {
            active.commands.shutdown();
            active.session.shutdown();
            log::debug!("DCP session stopped");
        }
        self.state = BringupState::Idle;
    }

    /// Alias of [`shutdown`](Self::shutdown)
    pub fn shutdown_display(&mut self) {
        self.shutdown();
    }

    fn bring_up(&mut self, wanted: &TimingMode) -> DisplayResult<ConfigureStatus> {
        let config = self.config;
        let platform = &mut self.platform;

        let active = Self::ensure_session(platform, &mut self.active, &config)?;
        self.state = BringupState::SessionStarted;

        let commands = &mut active.commands;
        commands.set_power(true).map_err(|e| {
            log::error!("failed to set power: {}", e);
            DisplayError::PowerOn(e)
        })?;
        self.state = BringupState::PoweredOn;

        // The firmware does not report a display right after boot
        self.state = BringupState::HotplugPolling;
        log::debug!(
            "polling display status for up to {} ms",
            config.hotplug_budget_ms()
        );
        let poll = poll_hotplug(
            commands,
            platform,
            config.hotplug_retries,
            config.hotplug_delay_ms,
        );
        log::info!("waited {} ms for display status", poll.waited_ms);

        let status = match poll.result {
            Ok(status) => status,
            Err(e) => {
                log::warn!("failed to get display status: {}", e);
                self.state = BringupState::Failed;
                return Ok(ConfigureStatus::StatusUnavailable);
            }
        };

        log::info!(
            "connected:{} timing_cnt:{} color_cnt:{}",
            u8::from(status.connected),
            status.timing_count,
            status.color_count
        );

        if !status.is_ready() {
            log::warn!("no display with usable modes");
            return Ok(ConfigureStatus::NoDisplay);
        }

        let timing_modes = commands.timing_modes().map_err(|e| {
            log::error!("failed to get timing modes: {}", e);
            DisplayError::TimingModes(e)
        })?;
        assert_eq!(
            timing_modes.len(),
            status.timing_count,
            "timing mode count changed since hot-plug"
        );
        let timing = choose_timing_mode(timing_modes, Some(wanted), &config.timing_limits);

        let color_modes = commands.color_modes().map_err(|e| {
            log::error!("failed to get color modes: {}", e);
            DisplayError::ColorModes(e)
        })?;
        assert_eq!(
            color_modes.len(),
            status.color_count,
            "color mode count changed since hot-plug"
        );
        let color = choose_color_mode(color_modes, &config.color_limits);
        self.state = BringupState::ModesReady;

        // Both lists were checked non-empty above
        let (Some(timing), Some(color)) = (timing, color) else {
            return Ok(ConfigureStatus::NoDisplay);
        };
        self.state = BringupState::ModeChosen;

        commands.set_mode(&timing, &color).map_err(|e| {
            log::error!("failed to set mode: {}", e);
            DisplayError::SetMode(e)
        })?;

        let swap_id = commands.swap_begin().map_err(|e| {
            log::error!("failed to start swap: {}", e);
            DisplayError::SwapBegin(e)
        })?;

        let layer = framebuffer_layer(&timing, &active.framebuffer)?;
        let rect = Rect::full(timing.width, timing.height);

        commands
            .swap_set_layer(config.swap_layer, &layer, &rect, &rect)
            .map_err(|e| {
                log::error!("failed to set layer: {}", e);
                DisplayError::SetLayer(e)
            })?;
        self.state = BringupState::LayerSubmitted;

        commands.swap_end().map_err(|e| {
            log::error!("failed to complete swap: {}", e);
            DisplayError::SwapEnd(e)
        })?;
        self.state = BringupState::Committed;

        log::info!("swapped! (swap_id={})", swap_id.0);

        Self::commit_geometry(platform, &layer);

        Ok(ConfigureStatus::Committed {
            swap_id,
            timing,
            color,
        })
    }

    fn ensure_session<'a>(
        platform: &mut P,
        slot: &'a mut Option<ActiveSession<P::Session>>,
        config: &DisplayConfig,
    ) -> DisplayResult<&'a mut ActiveSession<P::Session>> {
        let active = match slot.take() {
            Some(active) => active,
            None => Self::open_session(platform, config)?,
        };
        Ok(slot.insert(active))
    }

    fn open_session(
        platform: &mut P,
        config: &DisplayConfig,
    ) -> DisplayResult<ActiveSession<P::Session>> {
        let mut session = platform.start_session(&config.session_nodes()).map_err(|e| {
            log::error!("failed to initialize DCP: {}", e);
            DisplayError::SessionStart(e)
        })?;

        let base = platform.video().base;
        let tree = platform.device_tree();
        let resolved = vram::resolve_framebuffer(&mut session, tree, config.vram_node, base);
        let framebuffer = match resolved {
            Ok(framebuffer) => framebuffer,
            Err(e) => {
                log::error!("failed to find display DVA: {}", e);
                session.shutdown();
                return Err(e);
            }
        };

        let commands = match session.open_commands() {
            Ok(commands) => commands,
            Err(e) => {
                let error = DisplayError::InterfaceInit(e);
                log::error!("{}", error);
                session.shutdown();
                return Err(error);
            }
        };

        log::info!("DCP session started, fb at dva {:#x}", framebuffer.iova);

        Ok(ActiveSession {
            session,
            commands,
            framebuffer,
        })
    }

    fn commit_geometry(platform: &mut P, layer: &Layer) {
        let old = platform.video();
        let new = BootVideo {
            stride: layer.primary().map_or(0, |plane| u64::from(plane.stride)),
            width: u64::from(layer.width),
            height: u64::from(layer.height),
            depth: u64::from(layer.surface_format.depth()),
            ..old
        };

        let change = GeometryChange::between(&old, &new);
        if !change.is_empty() {
            log::debug!("boot video {} -> {} ({:?})", old, new, change);
            platform.set_video(new);
            platform.reinit_framebuffer();
        }

        platform.publish();
    }
}

/// Single full-screen layer scanning out the boot framebuffer
fn framebuffer_layer(
    timing: &TimingMode,
    framebuffer: &FramebufferMapping,
) -> DisplayResult<Layer> {
    let format = SurfaceFormat::W30r;
    let mut layer = Layer::new(timing.width, timing.height, format);

    layer
        .push_plane(PlaneDescriptor {
            addr: framebuffer.iova,
            stride: timing.width.saturating_mul(format.bytes_per_pixel()),
            addr_format: AddrFormat::Planar,
        })
        .map_err(|_| DisplayError::LayerFull)?;

    Ok(layer)
}
