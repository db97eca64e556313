//! The pluggable clock collaborator.
//!
//! The control plane never reads the system clock directly so that tests
//! (and the `beacon-testkit` harness) can drive phase timers and genesis
//! scheduling deterministically.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of wall-clock time, injected into every component that needs
/// to schedule genesis/transition times or evaluate timeouts.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// `Clock` backed by `SystemTime::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
