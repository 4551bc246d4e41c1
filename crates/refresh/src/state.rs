//! Refresh cycle states and the single-flight guard.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// `Idle -> Fetching -> Computing -> Publishing -> Idle`. A failed fetch
/// goes straight back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RefreshState {
    Idle = 0,
    Fetching = 1,
    Computing = 2,
    Publishing = 3,
}

impl RefreshState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Fetching,
            2 => Self::Computing,
            3 => Self::Publishing,
            _ => Self::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Computing => "computing",
            Self::Publishing => "publishing",
        }
    }
}

impl fmt::Display for RefreshState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
pub(crate) struct CycleTracker {
    in_flight: AtomicBool,
    state: AtomicU8,
}

impl CycleTracker {
    /// Claim the right to run a cycle. `None` if one is already running.
    pub(crate) fn try_begin(&self) -> Option<CycleGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard { tracker: self })
    }

    pub(crate) fn state(&self) -> RefreshState {
        RefreshState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Held for the duration of one cycle; releases the slot and returns the
/// state to `Idle` however the cycle ends.
pub(crate) struct CycleGuard<'a> {
    tracker: &'a CycleTracker,
}

impl CycleGuard<'_> {
    pub(crate) fn enter(&self, state: RefreshState) {
        self.tracker.state.store(state as u8, Ordering::Release);
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.tracker
            .state
            .store(RefreshState::Idle as u8, Ordering::Release);
        self.tracker.in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_flight() {
        let tracker = CycleTracker::default();
        let guard = tracker.try_begin().expect("first claim succeeds");
        assert!(tracker.is_running());
        assert!(tracker.try_begin().is_none());

        guard.enter(RefreshState::Computing);
        assert_eq!(tracker.state(), RefreshState::Computing);

        drop(guard);
        assert!(!tracker.is_running());
        assert_eq!(tracker.state(), RefreshState::Idle);
        assert!(tracker.try_begin().is_some());
    }

    #[test]
    fn test_display() {
        assert_eq!(RefreshState::Publishing.to_string(), "publishing");
    }
}
