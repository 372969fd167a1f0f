//! # Requested Mode Parsing
//!
//! Turns the user's mode string into a [`TimingMode`] used as selection
//! preference. Accepted forms:
//!
//! - `auto` (or no string at all): no preference
//! - `WIDTHxHEIGHT`
//! - `WIDTHxHEIGHT@FPS` or `WIDTHxHEIGHT@FPS.FF`
//!
//! Parsing never fails. Anything that does not look like a number reads as 0,
//! and a mode is only valid when both width and height are nonzero. A leading
//! `-` is not a number here, so `-1920x1080` reads as width 0 rather than
//! wrapping to a huge unsigned value.
//!
//! The fractional refresh rate is read as hundredths: `59.94` becomes
//! `59 + 94/100` but `60.5` becomes `60.05`. Values already stored by users
//! depend on this, so it is kept as is.

use helix_hal::dcp::{Fps, TimingMode};

/// Parse a requested mode string
pub fn parse_requested_mode(config: Option<&str>) -> TimingMode {
    let mut mode = TimingMode::NONE;

    let config = match config {
        Some(config) if config != "auto" => config,
        _ => return mode,
    };

    if let Some((_, height)) = config.split_once('x') {
        mode.width = to_u32(leading_decimal(config));
        mode.height = to_u32(leading_decimal(height));
        mode.valid = mode.width != 0 && mode.height != 0;
    }

    if let Some((_, rate)) = config.split_once('@') {
        let whole = (leading_decimal(rate) as u32) << Fps::FRAC_BITS;
        let frac = match rate.split_once('.') {
            Some((_, frac)) => ((leading_decimal(frac) << Fps::FRAC_BITS) / 100) as u32,
            None => 0,
        };
        mode.fps = Fps::from_raw(whole.wrapping_add(frac));
    }

    log::info!("want mode: {}", mode);

    mode
}

/// Value of the decimal digits at the start of `s`
///
/// Leading whitespace and a `+` sign are skipped. Stops at the first
/// non-digit; returns 0 if there is none.
fn leading_decimal(s: &str) -> u64 {
    let s = s.trim_start();
    let s = s.strip_prefix('+').unwrap_or(s);

    s.bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u64, |acc, digit| {
            acc.saturating_mul(10).saturating_add(u64::from(digit - b'0'))
        })
}

fn to_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(0)
}
