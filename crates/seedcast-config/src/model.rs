//! Typed configuration sections.
//!
//! # Design
//! - Every section implements `Default` so partial documents stay loadable.
//! - Durations are stored as whole seconds and exposed as `Duration` helpers.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use seedcast_core::RatioTarget;
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};

/// Complete application configuration snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Simulated upload rate bounds.
    pub rates: RateConfig,
    /// Share ratio at which torrents stop; `0` means unlimited.
    pub upload_ratio_target: f64,
    /// Identity advertised to trackers.
    pub client: ClientConfig,
    /// Announce cadence and retry tuning.
    pub announce: AnnounceConfig,
    /// Filesystem locations.
    pub paths: PathsConfig,
    /// Admin listener.
    pub admin: AdminConfig,
    /// Logging preferences.
    pub telemetry: TelemetryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rates: RateConfig::default(),
            upload_ratio_target: defaults::UPLOAD_RATIO_TARGET,
            client: ClientConfig::default(),
            announce: AnnounceConfig::default(),
            paths: PathsConfig::default(),
            admin: AdminConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Upload rate bounds converted to bytes per second.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when the maximum is below the minimum
    /// or the conversion overflows.
    pub fn upload_rate_bounds(&self) -> ConfigResult<RateBounds> {
        let min_bps = kilobytes_to_bytes("min_upload_rate", self.rates.min_upload_rate)?;
        let max_bps = kilobytes_to_bytes("max_upload_rate", self.rates.max_upload_rate)?;
        if max_bps < min_bps {
            return Err(ConfigError::invalid(
                "rates",
                "max_upload_rate",
                self.rates.max_upload_rate,
                "must be greater than or equal to min_upload_rate",
            ));
        }
        Ok(RateBounds { min_bps, max_bps })
    }

    /// Ratio target as a domain value.
    #[must_use]
    pub const fn ratio_target(&self) -> RatioTarget {
        RatioTarget::new(self.upload_ratio_target)
    }
}

fn kilobytes_to_bytes(field: &'static str, value: u64) -> ConfigResult<u64> {
    value
        .checked_mul(1_000)
        .ok_or_else(|| ConfigError::invalid("rates", field, value, "rate overflows bytes per second"))
}

/// Upload rate bounds in bytes per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBounds {
    /// Inclusive lower bound.
    pub min_bps: u64,
    /// Exclusive upper bound, or the exact rate when equal to `min_bps`.
    pub max_bps: u64,
}

/// Simulated upload rate bounds in kB/s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateConfig {
    /// Lower bound in kB/s.
    pub min_upload_rate: u64,
    /// Upper bound in kB/s.
    pub max_upload_rate: u64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            min_upload_rate: defaults::MIN_UPLOAD_RATE_KBPS,
            max_upload_rate: defaults::MAX_UPLOAD_RATE_KBPS,
        }
    }
}

/// Identity advertised to trackers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Listening port reported in announces.
    pub port: u16,
    /// Number of peers requested per announce.
    pub numwant: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: defaults::CLIENT_PORT,
            numwant: defaults::NUMWANT,
        }
    }
}

/// Announce cadence, deadlines, and retry tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnnounceConfig {
    /// Floor applied to tracker-dictated intervals.
    pub min_announce_interval_secs: u64,
    /// First retry delay after a failure.
    pub retry_base_secs: u64,
    /// Ceiling for the retry backoff.
    pub retry_max_interval_secs: u64,
    /// Deadline for regular announces.
    pub request_timeout_secs: u64,
    /// Deadline for the final `stopped` announce.
    pub stop_timeout_secs: u64,
    /// Interval between speed re-draws.
    pub speed_refresh_interval_secs: u64,
    /// Time announcers get to finish on shutdown.
    pub shutdown_grace_secs: u64,
    /// Withhold upload credit when the swarm reported no leechers.
    pub require_leechers: bool,
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            min_announce_interval_secs: defaults::MIN_ANNOUNCE_INTERVAL_SECS,
            retry_base_secs: defaults::RETRY_BASE_SECS,
            retry_max_interval_secs: defaults::RETRY_MAX_INTERVAL_SECS,
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            stop_timeout_secs: defaults::STOP_TIMEOUT_SECS,
            speed_refresh_interval_secs: defaults::SPEED_REFRESH_INTERVAL_SECS,
            shutdown_grace_secs: defaults::SHUTDOWN_GRACE_SECS,
            require_leechers: true,
        }
    }
}

impl AnnounceConfig {
    /// Floor applied to tracker-dictated intervals.
    #[must_use]
    pub const fn min_announce_interval(&self) -> Duration {
        Duration::from_secs(self.min_announce_interval_secs)
    }

    /// First retry delay.
    #[must_use]
    pub const fn retry_base(&self) -> Duration {
        Duration::from_secs(self.retry_base_secs)
    }

    /// Retry backoff ceiling.
    #[must_use]
    pub const fn retry_max_interval(&self) -> Duration {
        Duration::from_secs(self.retry_max_interval_secs)
    }

    /// Regular announce deadline.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Final announce deadline.
    #[must_use]
    pub const fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    /// Speed re-draw interval.
    #[must_use]
    pub const fn speed_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.speed_refresh_interval_secs)
    }

    /// Shutdown grace period.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Directory scanned for `.torrent` files.
    pub torrents_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            torrents_dir: PathBuf::from(defaults::TORRENTS_DIR),
        }
    }
}

/// Admin listener settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdminConfig {
    /// Whether the admin listener runs at all.
    pub enabled: bool,
    /// Address the listener binds to.
    pub bind_addr: IpAddr,
    /// Port the listener binds to.
    pub port: u16,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: defaults::ADMIN_BIND_ADDR,
            port: defaults::ADMIN_PORT,
        }
    }
}

impl AdminConfig {
    /// Socket address the listener binds to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

/// Logging preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub log_level: String,
    /// `json` or `pretty`; inferred from the build profile when absent.
    pub log_format: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::LOG_LEVEL.to_string(),
            log_format: None,
        }
    }
}
