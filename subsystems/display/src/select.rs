//! # Mode Selection
//!
//! Firmware reports timing and color modes as unordered lists. One of each is
//! picked by a left-to-right reduction over an ordered chain of criteria:
//!
//! - the current best starts as the first candidate
//! - each later candidate is compared criterion by criterion
//! - the first criterion that is not a tie decides: `Greater` replaces the
//!   best, `Less` rejects the candidate
//! - a candidate that ties on every criterion is rejected, so the earliest
//!   of equally ranked candidates wins
//!
//! Timing policy: valid first, then the user's request (exact size, closest
//! refresh rate), then a bootloader-friendly ceiling (1920x1200 at 60 Hz by
//! default), then the largest width, height and refresh rate.
//!
//! Color policy: valid first, then depths within the ceiling (32 bpp by
//! default), then the richest depth, colorimetry, encoding and EOTF.

use core::cmp::Ordering;
use helix_hal::dcp::{ColorMode, Fps, TimingMode};

/// One link of a comparison chain
///
/// Compares `candidate` against `best`. `Greater` means the candidate is
/// preferred.
pub type Criterion<T, C> = fn(candidate: &T, best: &T, context: &C) -> Ordering;

/// Reduce `candidates` to the preferred one
///
/// Returns `None` only for an empty list.
pub fn select_best<'a, T, C>(
    candidates: &'a [T],
    context: &C,
    criteria: &[Criterion<T, C>],
) -> Option<&'a T> {
    let (first, rest) = candidates.split_first()?;

    Some(rest.iter().fold(first, |best, candidate| {
        let verdict = criteria
            .iter()
            .map(|criterion| criterion(candidate, best, context))
            .find(|ordering| ordering.is_ne());

        match verdict {
            Some(Ordering::Greater) => candidate,
            _ => best,
        }
    }))
}

// =============================================================================
// TIMING MODES
// =============================================================================

/// Timing-mode ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingLimits {
    /// Widest preferred mode
    pub max_width: u32,
    /// Tallest preferred mode
    pub max_height: u32,
    /// Fastest preferred refresh rate
    pub max_fps: Fps,
}

impl TimingLimits {
    /// 1920x1200 at 60 Hz
    pub const fn new() -> Self {
        Self {
            max_width: 1920,
            max_height: 1200,
            max_fps: Fps::from_hz(60),
        }
    }
}

impl Default for TimingLimits {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the timing criteria look at besides the two candidates
#[derive(Debug, Clone, Copy)]
pub struct TimingPreference {
    /// User request; ignored unless valid
    pub wanted: Option<TimingMode>,
    /// Ceiling
    pub limits: TimingLimits,
}

impl TimingPreference {
    fn wanted(&self) -> Option<&TimingMode> {
        self.wanted.as_ref().filter(|wanted| wanted.valid)
    }
}

fn timing_valid(c: &TimingMode, b: &TimingMode, _: &TimingPreference) -> Ordering {
    c.valid.cmp(&b.valid)
}

fn timing_wanted_size(c: &TimingMode, b: &TimingMode, p: &TimingPreference) -> Ordering {
    match p.wanted() {
        Some(w) => c.same_size(w).cmp(&b.same_size(w)),
        None => Ordering::Equal,
    }
}

fn timing_wanted_fps(c: &TimingMode, b: &TimingMode, p: &TimingPreference) -> Ordering {
    match p.wanted() {
        // Closer is better, so the distances compare in reverse
        Some(w) => b.fps.abs_diff(w.fps).cmp(&c.fps.abs_diff(w.fps)),
        None => Ordering::Equal,
    }
}

fn timing_width_limit(c: &TimingMode, b: &TimingMode, p: &TimingPreference) -> Ordering {
    let max = p.limits.max_width;
    (c.width <= max).cmp(&(b.width <= max))
}

fn timing_height_limit(c: &TimingMode, b: &TimingMode, p: &TimingPreference) -> Ordering {
    let max = p.limits.max_height;
    (c.height <= max).cmp(&(b.height <= max))
}

fn timing_fps_limit(c: &TimingMode, b: &TimingMode, p: &TimingPreference) -> Ordering {
    let max = p.limits.max_fps;
    (c.fps <= max).cmp(&(b.fps <= max))
}

fn timing_width(c: &TimingMode, b: &TimingMode, _: &TimingPreference) -> Ordering {
    c.width.cmp(&b.width)
}

fn timing_height(c: &TimingMode, b: &TimingMode, _: &TimingPreference) -> Ordering {
    c.height.cmp(&b.height)
}

fn timing_fps(c: &TimingMode, b: &TimingMode, _: &TimingPreference) -> Ordering {
    c.fps.cmp(&b.fps)
}

/// Timing-mode criteria, most significant first
pub const TIMING_CRITERIA: [Criterion<TimingMode, TimingPreference>; 9] = [
    timing_valid,
    timing_wanted_size,
    timing_wanted_fps,
    timing_width_limit,
    timing_height_limit,
    timing_fps_limit,
    timing_width,
    timing_height,
    timing_fps,
];

/// Pick the timing mode to program
pub fn choose_timing_mode(
    modes: &[TimingMode],
    wanted: Option<&TimingMode>,
    limits: &TimingLimits,
) -> Option<TimingMode> {
    let preference = TimingPreference {
        wanted: wanted.copied(),
        limits: *limits,
    };

    let best = select_best(modes, &preference, &TIMING_CRITERIA).copied()?;
    log::info!("timing mode: {}", best);
    Some(best)
}

// =============================================================================
// COLOR MODES
// =============================================================================

/// Color-mode ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorLimits {
    /// Deepest preferred pixel depth
    pub max_bpp: u32,
}

impl ColorLimits {
    /// 32 bits per pixel
    pub const fn new() -> Self {
        Self { max_bpp: 32 }
    }
}

impl Default for ColorLimits {
    fn default() -> Self {
        Self::new()
    }
}

fn color_valid(c: &ColorMode, b: &ColorMode, _: &ColorLimits) -> Ordering {
    c.valid.cmp(&b.valid)
}

fn color_bpp_limit(c: &ColorMode, b: &ColorMode, l: &ColorLimits) -> Ordering {
    (c.bpp <= l.max_bpp).cmp(&(b.bpp <= l.max_bpp))
}

fn color_bpp(c: &ColorMode, b: &ColorMode, _: &ColorLimits) -> Ordering {
    c.bpp.cmp(&b.bpp)
}

fn color_colorimetry(c: &ColorMode, b: &ColorMode, _: &ColorLimits) -> Ordering {
    c.colorimetry.cmp(&b.colorimetry)
}

fn color_encoding(c: &ColorMode, b: &ColorMode, _: &ColorLimits) -> Ordering {
    c.encoding.cmp(&b.encoding)
}

fn color_eotf(c: &ColorMode, b: &ColorMode, _: &ColorLimits) -> Ordering {
    c.eotf.cmp(&b.eotf)
}

/// Color-mode criteria, most significant first
pub const COLOR_CRITERIA: [Criterion<ColorMode, ColorLimits>; 6] = [
    color_valid,
    color_bpp_limit,
    color_bpp,
    color_colorimetry,
    color_encoding,
    color_eotf,
];

/// Pick the color mode to program
pub fn choose_color_mode(modes: &[ColorMode], limits: &ColorLimits) -> Option<ColorMode> {
    let best = select_best(modes, limits, &COLOR_CRITERIA).copied()?;
    log::info!("color mode: {}", best);
    Some(best)
}
