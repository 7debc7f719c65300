use super::Backoff;

/// Exponential retry backoff with a fixed-point multiplier.
///
/// The multiplier is the ratio `multiplier / multiplier_base`, so `150 / 100`
/// grows each delay by 1.5x.  Delays never exceed `max_delay_ms`.
///
/// ```
/// use heimdall_common::retry::{policies::ExponentialBackoff, Backoff};
///
/// let backoff = ExponentialBackoff::new(1000, 150, 100);
/// assert_eq!(backoff.delay_after_failures(3).as_millis(), 2250);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    /// Initial delay before the first retry, in milliseconds.
    base_delay_ms: u64,

    multiplier: u64,
    multiplier_base: u64,
    max_delay_ms: u64,
}

impl ExponentialBackoff {
    pub fn new(base_delay_ms: u64, multiplier: u64, multiplier_base: u64) -> Self {
        assert!(multiplier_base != 0);
        Self {
            base_delay_ms,
            multiplier,
            multiplier_base,
            max_delay_ms: u64::MAX,
        }
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }
}

impl Default for ExponentialBackoff {
    /// 1.5s growing by 1.5x, capped at 5 minutes.
    fn default() -> Self {
        Self {
            base_delay_ms: 1_500,
            multiplier: 15,
            multiplier_base: 10,
            max_delay_ms: 300_000,
        }
    }
}

impl Backoff for ExponentialBackoff {
    fn base_delay_ms(&self) -> u64 {
        self.base_delay_ms
    }

    fn next_delay_ms(&self, curr_delay_ms: u64) -> u64 {
        curr_delay_ms.saturating_mul(self.multiplier) / self.multiplier_base
    }

    fn max_delay_ms(&self) -> u64 {
        self.max_delay_ms
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_exponential_growth() {
        let backoff = ExponentialBackoff::new(1000, 150, 100);
        assert_eq!(backoff.next_delay_ms(1000), 1500);
        assert_eq!(backoff.delay_after_failures(3), Duration::from_millis(2250));
    }

    #[test]
    fn test_default_is_capped() {
        let backoff = ExponentialBackoff::default();
        assert_eq!(backoff.delay_after_failures(1), Duration::from_millis(1_500));
        assert_eq!(backoff.delay_after_failures(100), Duration::from_secs(300));
    }
}
