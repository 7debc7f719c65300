//! Backoff policies for retrying calls to external services.

use std::time::Duration;

pub mod policies;

/// A delay schedule for consecutive failures.
pub trait Backoff {
    /// Base delay in ms.
    fn base_delay_ms(&self) -> u64;

    /// Generates next delay given current delay.
    fn next_delay_ms(&self, curr_delay_ms: u64) -> u64;

    /// Upper bound on any single delay, in ms.
    fn max_delay_ms(&self) -> u64 {
        u64::MAX
    }

    /// Delay to wait after the `failures`-th consecutive failure, counting
    /// from 1.
    fn delay_after_failures(&self, failures: u32) -> Duration {
        let max = self.max_delay_ms();
        let mut delay = self.base_delay_ms().min(max);
        for _ in 1..failures {
            if delay == max {
                break;
            }
            delay = self.next_delay_ms(delay).min(max);
        }
        Duration::from_millis(delay)
    }
}
