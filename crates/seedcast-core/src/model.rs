//! Core announce domain types shared across the workspace.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Client prefix carried by every generated peer id (Azureus style).
pub const PEER_ID_PREFIX: &[u8; 8] = b"-SC0100-";

/// SHA-1 digest of a torrent's bencoded `info` dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Wrap raw digest bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes as sent on the wire.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parse a 40 character hexadecimal representation.
    #[must_use]
    pub fn from_hex(value: &str) -> Option<Self> {
        if value.len() != 40 || !value.is_ascii() {
            return None;
        }
        let mut bytes = [0_u8; 20];
        for (index, slot) in bytes.iter_mut().enumerate() {
            let pair = &value[index * 2..index * 2 + 2];
            *slot = u8::from_str_radix(pair, 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl Display for InfoHash {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(formatter, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl Serialize for InfoHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for InfoHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_hex(&raw).ok_or_else(|| de::Error::custom("info hash must be 40 hex digits"))
    }
}

/// Twenty byte peer identifier presented to trackers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId([u8; 20]);

impl PeerId {
    /// Wrap raw peer id bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh peer id: the client prefix followed by random alphanumerics.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0_u8; 20];
        bytes[..PEER_ID_PREFIX.len()].copy_from_slice(PEER_ID_PREFIX);
        let mut rng = rand::rng();
        for slot in &mut bytes[PEER_ID_PREFIX.len()..] {
            *slot = rng.sample(Alphanumeric);
        }
        Self(bytes)
    }

    /// Raw peer id bytes as sent on the wire.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl Display for PeerId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl Serialize for PeerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Immutable description of a torrent being simulated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TorrentIdentity {
    /// Infohash identifying the torrent to the tracker.
    pub info_hash: InfoHash,
    /// Display name taken from the metainfo.
    pub name: String,
    /// Piece length in bytes.
    pub piece_size: u64,
    /// Total payload size in bytes.
    pub total_size: u64,
    /// HTTP(S) announce URL of the tracker.
    pub announce_url: String,
}

/// Counters to resume a torrent from instead of zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeStats {
    /// Bytes already reported as uploaded.
    pub uploaded: u64,
    /// Bytes already reported as downloaded.
    pub downloaded: u64,
}

/// Fabricated transfer counters reported to the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulatedStats {
    /// Total bytes reported as uploaded; never decreases.
    pub uploaded: u64,
    /// Total bytes reported as downloaded.
    pub downloaded: u64,
    /// Bytes still missing from the payload.
    pub left: u64,
    /// Peer id presented to the tracker.
    pub peer_id: PeerId,
    /// Listening port presented to the tracker.
    pub port: u16,
}

impl SimulatedStats {
    /// Initial counters for a torrent, optionally resuming from earlier totals.
    #[must_use]
    pub const fn initial(
        torrent: &TorrentIdentity,
        resume: ResumeStats,
        peer_id: PeerId,
        port: u16,
    ) -> Self {
        Self {
            uploaded: resume.uploaded,
            downloaded: resume.downloaded,
            left: torrent.total_size.saturating_sub(resume.downloaded),
            peer_id,
            port,
        }
    }

    /// Share ratio used for stop checks.
    ///
    /// Nothing transferred yields `0.0`; a zero download counter is treated as one
    /// byte so a seeding-only torrent still has a finite ratio.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn ratio(&self) -> f64 {
        if self.uploaded == 0 {
            return 0.0;
        }
        self.uploaded as f64 / self.downloaded.max(1) as f64
    }
}

/// Event classification attached to an announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnounceEvent {
    /// First announce of a torrent's lifecycle.
    Started,
    /// Regular interval announce.
    Update,
    /// Payload finished downloading.
    Completed,
    /// Final announce; terminal.
    Stopped,
}

impl AnnounceEvent {
    /// Lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Update => "update",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
        }
    }
}

impl Display for AnnounceEvent {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Decoded tracker reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnounceResult {
    /// Seconds the tracker asks us to wait before the next announce.
    pub interval_secs: u64,
    /// Optional lower bound on the announce cadence.
    #[serde(default)]
    pub min_interval_secs: Option<u64>,
    /// Number of seeders in the swarm.
    #[serde(default)]
    pub seeders: u32,
    /// Number of leechers in the swarm.
    #[serde(default)]
    pub leechers: u32,
    /// Explicit failure reason; the announce did not count when present.
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// Non-fatal warning from the tracker.
    #[serde(default)]
    pub warning_message: Option<String>,
    /// Opaque tracker id to echo back on later announces.
    #[serde(default)]
    pub tracker_id: Option<String>,
}

impl AnnounceResult {
    /// Tracker-dictated wait before the next announce.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        let secs = match self.min_interval_secs {
            Some(min) if min > self.interval_secs => min,
            _ => self.interval_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Share ratio at which a torrent stops seeding; zero means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatioTarget(f64);

impl RatioTarget {
    /// Build a target from a configured value; non-positive or non-finite values disable it.
    #[must_use]
    pub const fn new(value: f64) -> Self {
        if value.is_finite() && value > 0.0 {
            Self(value)
        } else {
            Self(0.0)
        }
    }

    /// A target that never triggers.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self(0.0)
    }

    /// Target ratio when one is configured.
    #[must_use]
    pub fn value(self) -> Option<f64> {
        (self.0 > 0.0).then_some(self.0)
    }

    /// Whether the counters have met the target.
    #[must_use]
    pub fn is_reached(self, stats: &SimulatedStats) -> bool {
        self.value().is_some_and(|target| stats.ratio() >= target)
    }
}

/// Why an announcer left the running states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The configured share ratio was met.
    RatioReached,
    /// The torrent was removed from the supervisor.
    Removed,
    /// The process is shutting down.
    Shutdown,
}

impl StopReason {
    /// Lowercase label used in logs and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RatioReached => "ratio_reached",
            Self::Removed => "removed",
            Self::Shutdown => "shutdown",
        }
    }
}
