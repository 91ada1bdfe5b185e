//! Live configuration snapshot shared by every announcer.
//!
//! # Design
//! - Readers load an `Arc<AppConfig>` and never observe a half-applied update.
//! - Replacements are validated first; an invalid document leaves the current snapshot live.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use tracing::{info, warn};

use crate::error::ConfigResult;
use crate::model::AppConfig;
use crate::validate::validate_config;

/// Cloneable handle to the live configuration.
#[derive(Clone, Debug)]
pub struct ConfigProvider {
    current: Arc<ArcSwap<AppConfig>>,
    revision: Arc<AtomicU64>,
}

impl ConfigProvider {
    /// Wrap an initial configuration after validating it.
    ///
    /// # Errors
    ///
    /// Returns the validation error when `config` is invalid.
    pub fn new(config: AppConfig) -> ConfigResult<Self> {
        validate_config(&config)?;
        Ok(Self {
            current: Arc::new(ArcSwap::from_pointee(config)),
            revision: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Current snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<AppConfig> {
        self.current.load_full()
    }

    /// Revision counter, bumped on every accepted replacement.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Swap in a new snapshot and return its revision.
    ///
    /// # Errors
    ///
    /// Returns the validation error and keeps the previous snapshot when `config` is invalid.
    pub fn replace(&self, config: AppConfig) -> ConfigResult<u64> {
        if let Err(err) = validate_config(&config) {
            warn!(error = ?err, "rejected configuration update; keeping previous snapshot");
            return Err(err);
        }
        self.current.store(Arc::new(config));
        let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;
        info!(revision, "configuration snapshot replaced");
        Ok(revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RateConfig;

    #[test]
    fn replace_swaps_snapshot_and_bumps_revision() -> anyhow::Result<()> {
        let provider = ConfigProvider::new(AppConfig::default())?;
        let before = provider.current();
        let revision = provider.replace(AppConfig {
            upload_ratio_target: 3.0,
            ..AppConfig::default()
        })?;
        assert_eq!(revision, 2);
        assert_eq!(provider.revision(), 2);
        assert!(before.upload_ratio_target.abs() < f64::EPSILON);
        assert!((provider.current().upload_ratio_target - 3.0).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn invalid_replacement_keeps_previous_snapshot() -> anyhow::Result<()> {
        let provider = ConfigProvider::new(AppConfig::default())?;
        let invalid = AppConfig {
            rates: RateConfig {
                min_upload_rate: 100,
                max_upload_rate: 10,
            },
            ..AppConfig::default()
        };
        assert!(provider.replace(invalid).is_err());
        assert_eq!(provider.revision(), 1);
        assert_eq!(provider.current().rates, RateConfig::default());
        Ok(())
    }

    #[test]
    fn clones_share_the_snapshot() -> anyhow::Result<()> {
        let provider = ConfigProvider::new(AppConfig::default())?;
        let clone = provider.clone();
        let mut next = AppConfig::default();
        next.client.numwant = 5;
        provider.replace(next)?;
        assert_eq!(clone.current().client.numwant, 5);
        Ok(())
    }

    #[test]
    fn invalid_initial_config_is_rejected() {
        let config = AppConfig {
            upload_ratio_target: f64::INFINITY,
            ..AppConfig::default()
        };
        assert!(ConfigProvider::new(config).is_err());
    }
}
