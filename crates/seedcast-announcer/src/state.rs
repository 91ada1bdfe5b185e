//! Announcer lifecycle states and the read-only snapshot published by each task.

use chrono::{DateTime, Utc};
use seedcast_core::{AnnounceResult, InfoHash, SimulatedStats, StopReason};
use serde::Serialize;

/// Lifecycle of a single announcer.
///
/// `Idle -> Starting -> Running <-> Retrying -> Stopping -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncerState {
    /// Built but not spawned.
    Idle,
    /// Spawned; the `started` announce has not succeeded yet.
    Starting,
    /// Announcing on the tracker-dictated interval.
    Running,
    /// Backing off after a failed announce.
    Retrying,
    /// Sending the final `stopped` announce.
    Stopping,
    /// Terminal.
    Stopped,
}

/// Point-in-time view of an announcer, safe to read from any task.
#[derive(Debug, Clone, Serialize)]
pub struct AnnouncerSnapshot {
    /// Torrent infohash.
    pub info_hash: InfoHash,
    /// Torrent display name.
    pub name: String,
    /// Current lifecycle state.
    pub state: AnnouncerState,
    /// Counters committed by the last successful announce.
    pub stats: SimulatedStats,
    /// Share ratio of the committed counters.
    pub ratio: f64,
    /// Ratio target captured when the announcer was created.
    pub ratio_target: Option<f64>,
    /// Current simulated rate in bytes per second.
    pub speed_bps: u64,
    /// Last decoded tracker reply.
    pub last_result: Option<AnnounceResult>,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Wall-clock estimate of the next announce.
    pub next_announce_at: Option<DateTime<Utc>>,
    /// Why the announcer stopped, once it has.
    pub stop_reason: Option<StopReason>,
}
