//! Exponential respawn delays for crashed workers.
//!
//! # Design Decisions
//! - Delays grow per worker id, so one crashing worker never slows the others
//! - A worker that ran for [`STABLE_RUN`] before crashing starts over from
//!   the base delay
//! - Delays carry no jitter

use std::collections::HashMap;
use std::time::Duration;

/// Delay before the first respawn of a worker.
pub(crate) const RESPAWN_BASE: Duration = Duration::from_millis(50);

/// Upper bound on any respawn delay.
pub(crate) const RESPAWN_MAX: Duration = Duration::from_secs(5);

/// Uptime after which a crash no longer counts as a repeat.
pub(crate) const STABLE_RUN: Duration = Duration::from_secs(10);

/// Calculate the exponential delay for the `attempt`-th consecutive respawn.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u32.saturating_pow(attempt - 1);
    base.saturating_mul(factor).min(max)
}

/// Consecutive crash counts by worker id.
#[derive(Debug, Default)]
pub(crate) struct RespawnBackoff {
    attempts: HashMap<u32, u32>,
}

impl RespawnBackoff {
    /// Delay before respawning `worker_id`, which crashed after `uptime`.
    pub(crate) fn next_delay(&mut self, worker_id: u32, uptime: Duration) -> Duration {
        let attempt = self.attempts.entry(worker_id).or_insert(0);
        if uptime >= STABLE_RUN {
            *attempt = 0;
        }
        *attempt = attempt.saturating_add(1);
        calculate_backoff(*attempt, RESPAWN_BASE, RESPAWN_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let base = Duration::from_millis(100);
        let max = Duration::from_millis(1000);

        assert_eq!(calculate_backoff(0, base, max), Duration::ZERO);
        assert_eq!(calculate_backoff(1, base, max), Duration::from_millis(100));
        assert_eq!(calculate_backoff(2, base, max), Duration::from_millis(200));
        assert_eq!(calculate_backoff(4, base, max), Duration::from_millis(800));
        assert_eq!(calculate_backoff(5, base, max), max);
        assert_eq!(calculate_backoff(u32::MAX, base, max), max);
    }

    #[test]
    fn repeated_crashes_grow_per_worker() {
        let mut backoff = RespawnBackoff::default();
        let quick = Duration::from_millis(1);

        assert_eq!(backoff.next_delay(0, quick), RESPAWN_BASE);
        assert_eq!(backoff.next_delay(0, quick), RESPAWN_BASE * 2);
        assert_eq!(backoff.next_delay(0, quick), RESPAWN_BASE * 4);

        // Another worker keeps its own count.
        assert_eq!(backoff.next_delay(1, quick), RESPAWN_BASE);
    }

    #[test]
    fn stable_run_resets_the_delay() {
        let mut backoff = RespawnBackoff::default();
        let quick = Duration::from_millis(1);

        backoff.next_delay(2, quick);
        backoff.next_delay(2, quick);
        assert_eq!(backoff.next_delay(2, STABLE_RUN), RESPAWN_BASE);
        assert_eq!(backoff.next_delay(2, quick), RESPAWN_BASE * 2);
    }
}
