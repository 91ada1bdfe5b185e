//! Torrent and configuration fixtures.

use seedcast_config::{AnnounceConfig, AppConfig, RateConfig};
use seedcast_core::{InfoHash, TorrentIdentity};

/// Announce URL used by every fixture torrent.
pub const FIXTURE_ANNOUNCE_URL: &str = "http://tracker.test/announce";

/// Torrent fixture with a deterministic infohash derived from `seed`.
#[must_use]
pub fn torrent(seed: u8, total_size: u64) -> TorrentIdentity {
    TorrentIdentity {
        info_hash: InfoHash::new([seed; 20]),
        name: format!("fixture-{seed}.iso"),
        piece_size: 262_144,
        total_size,
        announce_url: FIXTURE_ANNOUNCE_URL.to_string(),
    }
}

/// Configuration with a fixed upload rate, a ratio target, and short deadlines.
///
/// Intervals: 5 s announce floor, 5 s retry base, 40 s retry ceiling, 10 s
/// request timeout, 2 s stop timeout.
#[must_use]
pub fn config(rate_kbps: u64, ratio_target: f64) -> AppConfig {
    AppConfig {
        rates: RateConfig {
            min_upload_rate: rate_kbps,
            max_upload_rate: rate_kbps,
        },
        upload_ratio_target: ratio_target,
        announce: AnnounceConfig {
            min_announce_interval_secs: 5,
            retry_base_secs: 5,
            retry_max_interval_secs: 40,
            request_timeout_secs: 10,
            stop_timeout_secs: 2,
            speed_refresh_interval_secs: 1_200,
            shutdown_grace_secs: 5,
            require_leechers: true,
        },
        ..AppConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_config_is_valid() {
        assert!(seedcast_config::validate_config(&config(50, 1.0)).is_ok());
    }

    #[test]
    fn fixture_torrents_differ_by_seed() {
        assert_ne!(torrent(1, 10).info_hash, torrent(2, 10).info_hash);
    }
}
