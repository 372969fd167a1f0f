//! # Busy-wait Delays
//!
//! The bring-up stage has no scheduler. Waiting means spinning on a timer.

/// Synchronous delay provider
pub trait Delay {
    /// Spin for at least `ms` milliseconds
    fn delay_ms(&mut self, ms: u32);
}

/// Delay that returns immediately
///
/// Used where the wait is meaningless, e.g. host-side tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl Delay for NoDelay {
    #[inline]
    fn delay_ms(&mut self, _ms: u32) {}
}

impl<D: Delay + ?Sized> Delay for &mut D {
    #[inline]
    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms);
    }
}
