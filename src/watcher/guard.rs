//! Single-shot guard.

use std::sync::atomic::{AtomicBool, Ordering};

/// Lets exactly one caller through, ever.
///
/// `try_fire` is a compare-and-swap from armed to fired, so concurrent callers
/// (e.g. two overlapping timer ticks) cannot both win.
#[derive(Debug, Default)]
pub struct SingleShot {
    fired: AtomicBool,
}

impl SingleShot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` for the first caller only.
    pub fn try_fire(&self) -> bool {
        self.fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}
