//! Default values applied when a configuration section or field is absent.

use std::net::{IpAddr, Ipv4Addr};

/// Lower bound of the simulated upload rate in kB/s.
pub const MIN_UPLOAD_RATE_KBPS: u64 = 30;
/// Upper bound of the simulated upload rate in kB/s.
pub const MAX_UPLOAD_RATE_KBPS: u64 = 160;
/// Ratio at which torrents stop; zero disables the check.
pub const UPLOAD_RATIO_TARGET: f64 = 0.0;
/// Port advertised to trackers.
pub const CLIENT_PORT: u16 = 49_152;
/// Number of peers requested per announce.
pub const NUMWANT: u32 = 200;
/// Floor applied to tracker-dictated intervals, in seconds.
pub const MIN_ANNOUNCE_INTERVAL_SECS: u64 = 60;
/// First retry delay after a failed announce, in seconds.
pub const RETRY_BASE_SECS: u64 = 5;
/// Ceiling for the retry backoff, in seconds.
pub const RETRY_MAX_INTERVAL_SECS: u64 = 1_800;
/// Deadline for a regular announce, in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Deadline for the final `stopped` announce, in seconds.
pub const STOP_TIMEOUT_SECS: u64 = 5;
/// Interval between speed re-draws, in seconds.
pub const SPEED_REFRESH_INTERVAL_SECS: u64 = 1_200;
/// Time announcers get to finish on shutdown before they are aborted, in seconds.
pub const SHUTDOWN_GRACE_SECS: u64 = 10;
/// Directory scanned for `.torrent` files.
pub const TORRENTS_DIR: &str = "torrents";
/// Admin listener address.
pub const ADMIN_BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
/// Admin listener port.
pub const ADMIN_PORT: u16 = 7_070;
/// Log level used when `RUST_LOG` is unset.
pub const LOG_LEVEL: &str = "info";
