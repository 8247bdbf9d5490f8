//! Busy-wait primitive
//!
//! Every "wait until the hardware says done" in the driver goes through
//! [`spin_until`]. There is no timeout: a wedged device hangs the caller,
//! which is the only option before a scheduler exists. The [`Relax`] hook
//! runs once per unsuccessful poll, so a test harness can count polls and
//! turn a hang into a diagnostic.

/// Hook invoked between polls of a busy flag
pub trait Relax {
    /// Called after each poll that found the hardware still busy
    fn relax(&self);
}

/// Default relax hook: a CPU spin-loop hint
#[derive(Debug, Clone, Copy, Default)]
pub struct Spin;

impl Relax for Spin {
    #[inline]
    fn relax(&self) {
        core::hint::spin_loop();
    }
}

impl<R: Relax + ?Sized> Relax for &R {
    fn relax(&self) {
        (**self).relax()
    }
}

/// Poll `done` until it returns true, relaxing between polls
#[inline]
pub fn spin_until<R, F>(relax: &R, mut done: F)
where
    R: Relax + ?Sized,
    F: FnMut() -> bool,
{
    while !done() {
        relax.relax();
    }
}
