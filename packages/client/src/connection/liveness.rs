//! Consecutive-failure accounting for the connection monitor.
//!
//! Pure logic, no I/O, so the reconnect/fallback cadence can be tested
//! without sockets or timers.

/// What the monitor should do after one liveness poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessAction {
    /// Link is up
    Healthy,
    /// Link is down; reconnect to the last URL right away
    Reconnect,
    /// Too many consecutive failures; stop retrying, ask the caller, cool down
    Fallback { failures: u32 },
}

/// Counts consecutive failed polls.
///
/// The counter resets on a healthy poll and when a fallback fires, so a
/// fallback is raised exactly once per `threshold` consecutive failures.
#[derive(Debug, Clone)]
pub struct LivenessTracker {
    threshold: u32,
    failures: u32,
}

impl LivenessTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            failures: 0,
        }
    }

    pub fn observe(&mut self, connected: bool) -> LivenessAction {
        if connected {
            self.failures = 0;
            return LivenessAction::Healthy;
        }

        self.failures += 1;
        if self.failures >= self.threshold {
            let failures = self.failures;
            self.failures = 0;
            LivenessAction::Fallback { failures }
        } else {
            LivenessAction::Reconnect
        }
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}
