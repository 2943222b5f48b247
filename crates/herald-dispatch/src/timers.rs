use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Timer gating queue sends after a failed delivery.
pub const RETRY_DELAY_TIMER: &str = "retry-delay";

/// Timer pacing credential refresh attempts.
pub const CREDENTIAL_REFRESH_TIMER: &str = "credential-refresh";

/// Named one-shot timers for the dispatch loop.
///
/// A timer that was never armed reads as elapsed, so gated work runs
/// on the first opportunity and is only held back while a deadline is
/// pending. Arming again with [`TimerSet::reset`] replaces the old
/// deadline.
#[derive(Debug, Default)]
pub struct TimerSet {
    deadlines: HashMap<String, Instant>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `name` to elapse after `duration` from now.
    pub fn reset(&mut self, name: &str, duration: Duration) {
        self.reset_at(name, Instant::now() + duration);
    }

    pub fn reset_at(&mut self, name: &str, deadline: Instant) {
        self.deadlines.insert(name.to_string(), deadline);
    }

    pub fn is_elapsed(&self, name: &str) -> bool {
        self.is_elapsed_at(name, Instant::now())
    }

    pub fn is_elapsed_at(&self, name: &str, now: Instant) -> bool {
        match self.deadlines.get(name) {
            Some(deadline) => now >= *deadline,
            None => true,
        }
    }

    /// Disarms `name`; it reads as elapsed again afterwards.
    pub fn clear(&mut self, name: &str) {
        self.deadlines.remove(name);
    }
}
