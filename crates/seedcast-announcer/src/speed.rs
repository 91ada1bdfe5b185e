//! Simulated upload rate drawn from the configured bounds.

use rand::Rng;
use seedcast_config::{ConfigProvider, ConfigResult, RateBounds};

/// Per-announcer source of the simulated upload rate.
#[derive(Debug, Clone)]
pub struct SpeedProvider {
    config: ConfigProvider,
    current: u64,
}

impl SpeedProvider {
    /// Build a provider and draw its first sample.
    ///
    /// # Errors
    ///
    /// Returns the configuration error when the live bounds are invalid.
    pub fn new(config: ConfigProvider) -> ConfigResult<Self> {
        let mut provider = Self { config, current: 0 };
        provider.refresh()?;
        Ok(provider)
    }

    /// Last drawn rate in bytes per second.
    #[must_use]
    pub const fn current_speed(&self) -> u64 {
        self.current
    }

    /// Re-read the bounds and draw a new sample.
    ///
    /// # Errors
    ///
    /// Returns the configuration error and keeps the previous sample when the
    /// live bounds are invalid.
    pub fn refresh(&mut self) -> ConfigResult<u64> {
        let bounds = self.config.current().upload_rate_bounds()?;
        self.current = draw(bounds);
        Ok(self.current)
    }
}

/// Uniform draw in `[min, max)`, or exactly `max` when the bounds are equal.
fn draw(bounds: RateBounds) -> u64 {
    if bounds.min_bps >= bounds.max_bps {
        return bounds.max_bps;
    }
    rand::rng().random_range(bounds.min_bps..bounds.max_bps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedcast_config::{AppConfig, RateConfig};

    fn provider(min: u64, max: u64) -> anyhow::Result<(ConfigProvider, SpeedProvider)> {
        let config = ConfigProvider::new(AppConfig {
            rates: RateConfig {
                min_upload_rate: min,
                max_upload_rate: max,
            },
            ..AppConfig::default()
        })?;
        let speed = SpeedProvider::new(config.clone())?;
        Ok((config, speed))
    }

    #[test]
    fn equal_bounds_are_deterministic() -> anyhow::Result<()> {
        let (_, mut speed) = provider(50, 50)?;
        assert_eq!(speed.current_speed(), 50_000);
        for _ in 0..32 {
            assert_eq!(speed.refresh()?, 50_000);
        }
        Ok(())
    }

    #[test]
    fn samples_stay_in_half_open_range() -> anyhow::Result<()> {
        let (_, mut speed) = provider(10, 12)?;
        for _ in 0..256 {
            let value = speed.refresh()?;
            assert!((10_000..12_000).contains(&value), "{value} out of range");
        }
        Ok(())
    }

    #[test]
    fn zero_bounds_yield_zero() -> anyhow::Result<()> {
        let (_, speed) = provider(0, 0)?;
        assert_eq!(speed.current_speed(), 0);
        Ok(())
    }

    #[test]
    fn refresh_follows_config_updates() -> anyhow::Result<()> {
        let (config, mut speed) = provider(50, 50)?;
        config.replace(AppConfig {
            rates: RateConfig {
                min_upload_rate: 80,
                max_upload_rate: 80,
            },
            ..AppConfig::default()
        })?;
        assert_eq!(speed.current_speed(), 50_000);
        assert_eq!(speed.refresh()?, 80_000);
        Ok(())
    }

    #[test]
    fn reads_are_pure() -> anyhow::Result<()> {
        let (_, speed) = provider(1, 1_000)?;
        let first = speed.current_speed();
        assert_eq!(speed.current_speed(), first);
        Ok(())
    }
}
