//! Guards for asynchronous operations.
//!
//! [`InFlight`] turns a second concurrent call into an immediate refusal
//! instead of a race. [`Epoch`] lets a long-running call detect that the
//! state it started from has since been reset.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// At-most-one-in-flight flag.
#[derive(Debug, Default)]
pub struct InFlight {
    busy: AtomicBool,
}

impl InFlight {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// Claim the flag, or `None` if another call holds it.
    ///
    /// The flag is released when the returned guard is dropped, including on
    /// early return and when the owning future is cancelled.
    #[must_use]
    pub fn try_begin(&self) -> Option<InFlightGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard { flag: &self.busy })
    }

    /// Whether a call currently holds the flag.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases an [`InFlight`] flag on drop.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Monotonic generation counter.
#[derive(Debug, Default)]
pub struct Epoch(AtomicU64);

impl Epoch {
    #[must_use]
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Invalidate every snapshot taken so far.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Whether `snapshot` is still the current generation.
    #[must_use]
    pub fn is_current(&self, snapshot: u64) -> bool {
        self.current() == snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_refused_until_drop() {
        let flag = InFlight::new();
        let guard = flag.try_begin();
        assert!(guard.is_some());
        assert!(flag.is_busy());
        assert!(flag.try_begin().is_none());

        drop(guard);
        assert!(!flag.is_busy());
        assert!(flag.try_begin().is_some());
    }

    #[test]
    fn test_epoch_snapshot_goes_stale() {
        let epoch = Epoch::default();
        let snapshot = epoch.current();
        assert!(epoch.is_current(snapshot));

        assert_eq!(epoch.advance(), snapshot + 1);
        assert!(!epoch.is_current(snapshot));
    }
}
