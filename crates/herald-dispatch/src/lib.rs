//! The delivery loop: drains the spool one message per tick.
//!
//! Runs as a single consumer next to the request gate. Failures pause
//! the entire queue for a fixed delay before the next attempt, and
//! credential refresh runs on its own independent timer.

mod dispatcher;
mod timers;

pub use dispatcher::{DispatchConfig, DispatchLoop, TickOutcome};
pub use timers::{TimerSet, CREDENTIAL_REFRESH_TIMER, RETRY_DELAY_TIMER};
