//! Non-blocking flush gate.
//!
//! Cache flushes must be exclusive but must never queue: a flush triggered
//! while another is running is abandoned, because the running pass will
//! already persist the same (or newer) state. The gate makes that
//! skip-on-contention rule an explicit, named type instead of a bare
//! counter.

use std::sync::atomic::{AtomicBool, Ordering};

/// Try-lock with skip-on-contention semantics.
///
/// [`try_acquire`](Self::try_acquire) either returns a permit immediately or
/// reports the gate as held; it never blocks and never queues waiters.
/// Starvation under repeated overlapping triggers is acceptable and
/// self-heals on a later cycle.
///
/// # Examples
///
/// ```
/// use bakery_cache::FlushGate;
///
/// let gate = FlushGate::new();
/// let permit = gate.try_acquire().expect("gate is free");
/// assert!(gate.try_acquire().is_none());
/// drop(permit);
/// assert!(gate.try_acquire().is_some());
/// ```
#[derive(Debug, Default)]
pub struct FlushGate {
    held: AtomicBool,
}

impl FlushGate {
    /// Creates a gate in the released state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    /// Attempts to take the gate without blocking.
    ///
    /// Returns `None` when the gate is already held. The permit releases the
    /// gate on drop, including on panic in the guarded pass.
    #[must_use]
    pub fn try_acquire(&self) -> Option<FlushPermit<'_>> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_was| FlushPermit { gate: self })
    }
}

/// RAII permit proving exclusive ownership of a [`FlushGate`].
#[derive(Debug)]
pub struct FlushPermit<'a> {
    gate: &'a FlushGate,
}

impl Drop for FlushPermit<'_> {
    fn drop(&mut self) {
        self.gate.held.store(false, Ordering::Release);
    }
}
