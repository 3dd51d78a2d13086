//! Engine configuration.

use std::time::Duration;

/// Multiplier over a job's timeout beyond which the workflow start time is
/// treated as carried over from a previous process lifetime and reset
/// instead of firing the fallback. Heuristic, not a correctness guarantee.
pub const STALE_RESET_MULTIPLIER: u32 = 2;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between polling passes in blocking wait mode.
    pub poll_interval: Duration,
    /// Staleness multiplier for timeout reset after a restart.
    pub stale_reset_multiplier: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            stale_reset_multiplier: STALE_RESET_MULTIPLIER,
        }
    }
}
