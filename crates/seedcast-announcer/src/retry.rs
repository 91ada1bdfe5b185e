//! Exponential retry backoff.

use std::time::Duration;

use seedcast_config::AnnounceConfig;

/// Doubling backoff capped at a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base: Duration,
    ceiling: Duration,
}

impl RetryPolicy {
    /// Policy with explicit bounds.
    #[must_use]
    pub const fn new(base: Duration, ceiling: Duration) -> Self {
        Self { base, ceiling }
    }

    /// Delay after `failures` consecutive failures: `base * 2^(failures - 1)`, capped.
    #[must_use]
    pub fn delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.base
            .saturating_mul(1_u32 << exponent)
            .min(self.ceiling)
    }
}

impl From<&AnnounceConfig> for RetryPolicy {
    fn from(config: &AnnounceConfig) -> Self {
        Self::new(config.retry_base(), config.retry_max_interval())
    }
}
