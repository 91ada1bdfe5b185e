//! Announce query construction and bencoded reply decoding for HTTP trackers.

use std::fmt::Write as _;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_encode};
use rand::Rng;
use reqwest::Url;
use seedcast_core::{
    AnnounceDataAccessor, AnnounceError, AnnounceEvent, AnnounceRequest, AnnounceResult,
    SimulatedStats, TorrentIdentity,
};
use serde::Deserialize;

/// Lowest interval accepted from a tracker reply.
pub const MIN_TRACKER_INTERVAL_SECS: u64 = 60;
/// Highest interval accepted from a tracker reply.
pub const MAX_TRACKER_INTERVAL_SECS: u64 = 3_600;

/// Bytes left unescaped in query values: alphanumerics and `-._~`.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Deserialize)]
struct TrackerReply {
    #[serde(rename = "failure reason", default)]
    failure_reason: Option<String>,
    #[serde(rename = "warning message", default)]
    warning_message: Option<String>,
    #[serde(default)]
    interval: Option<u64>,
    #[serde(rename = "min interval", default)]
    min_interval: Option<u64>,
    #[serde(rename = "tracker id", default)]
    tracker_id: Option<String>,
    #[serde(default)]
    complete: Option<u32>,
    #[serde(default)]
    incomplete: Option<u32>,
}

/// BEP 3 announce codec.
///
/// The `key` nonce is drawn once per accessor so the tracker can correlate
/// announces across IP changes.
#[derive(Debug, Clone)]
pub struct BencodeAnnounceAccessor {
    numwant: u32,
    key: u32,
}

impl BencodeAnnounceAccessor {
    /// Accessor requesting `numwant` peers with a random key.
    #[must_use]
    pub fn new(numwant: u32) -> Self {
        Self::with_key(numwant, rand::rng().random())
    }

    /// Accessor with a fixed key.
    #[must_use]
    pub const fn with_key(numwant: u32, key: u32) -> Self {
        Self { numwant, key }
    }

    /// Key sent with every announce.
    #[must_use]
    pub const fn key(&self) -> u32 {
        self.key
    }
}

impl AnnounceDataAccessor for BencodeAnnounceAccessor {
    fn build_request(
        &self,
        torrent: &TorrentIdentity,
        stats: &SimulatedStats,
        event: AnnounceEvent,
    ) -> Result<AnnounceRequest, AnnounceError> {
        let base = torrent.announce_url.trim();
        let parsed = Url::parse(base).map_err(|err| AnnounceError::InvalidRequest {
            detail: format!("announce url `{base}`: {err}"),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AnnounceError::InvalidRequest {
                detail: format!("unsupported tracker scheme `{}`", parsed.scheme()),
            });
        }

        let mut url = String::with_capacity(base.len() + 256);
        url.push_str(base);
        match base.rfind('?') {
            None => url.push('?'),
            Some(_) if base.ends_with(['?', '&']) => {}
            Some(_) => url.push('&'),
        }

        // Writing into a String cannot fail.
        let _ = write!(
            url,
            "info_hash={}&peer_id={}&port={}&uploaded={}&downloaded={}&left={}&corrupt=0&key={:08X}",
            percent_encode(torrent.info_hash.as_bytes(), QUERY_VALUE),
            percent_encode(stats.peer_id.as_bytes(), QUERY_VALUE),
            stats.port,
            stats.uploaded,
            stats.downloaded,
            stats.left,
            self.key,
        );
        if event != AnnounceEvent::Update {
            let _ = write!(url, "&event={}", event.as_str());
        }
        let _ = write!(url, "&numwant={}&compact=1&no_peer_id=1", self.numwant);

        Ok(AnnounceRequest { url, event })
    }

    fn parse_response(&self, body: &[u8]) -> Result<AnnounceResult, AnnounceError> {
        let reply: TrackerReply = serde_bencode::from_bytes(body)
            .map_err(|err| AnnounceError::decode(err.to_string()))?;

        if let Some(reason) = reply.failure_reason {
            return Err(AnnounceError::TrackerFailure { reason });
        }
        let interval = reply
            .interval
            .ok_or_else(|| AnnounceError::decode("reply is missing `interval`"))?;

        Ok(AnnounceResult {
            interval_secs: clamp_interval(interval),
            min_interval_secs: reply.min_interval.map(clamp_interval),
            seeders: reply.complete.unwrap_or(0),
            leechers: reply.incomplete.unwrap_or(0),
            failure_reason: None,
            warning_message: reply.warning_message,
            tracker_id: reply.tracker_id,
        })
    }
}

fn clamp_interval(secs: u64) -> u64 {
    secs.clamp(MIN_TRACKER_INTERVAL_SECS, MAX_TRACKER_INTERVAL_SECS)
}

#[cfg(test)]
mod tests {
    use seedcast_core::{InfoHash, PeerId, ResumeStats};

    use super::*;

    fn torrent(announce_url: &str) -> TorrentIdentity {
        TorrentIdentity {
            info_hash: InfoHash::new([0xAB; 20]),
            name: "demo.iso".into(),
            piece_size: 16_384,
            total_size: 1_000,
            announce_url: announce_url.into(),
        }
    }

    fn stats(torrent: &TorrentIdentity) -> SimulatedStats {
        let mut stats = SimulatedStats::initial(
            torrent,
            ResumeStats {
                uploaded: 42,
                downloaded: 400,
            },
            PeerId::new(*b"-SC0100-abc.def~ghi!"),
            6_881,
        );
        stats.uploaded = 4_200;
        stats
    }

    #[test]
    fn query_carries_counters_and_event() {
        let accessor = BencodeAnnounceAccessor::with_key(50, 0x2A);
        let torrent = torrent("http://tracker.test/announce");
        let request = accessor
            .build_request(&torrent, &stats(&torrent), AnnounceEvent::Started)
            .expect("request");

        assert_eq!(request.event, AnnounceEvent::Started);
        assert_eq!(
            request.url,
            format!(
                "http://tracker.test/announce?info_hash={}&peer_id=-SC0100-abc.def~ghi%21\
                 &port=6881&uploaded=4200&downloaded=400&left=600&corrupt=0&key=0000002A\
                 &event=started&numwant=50&compact=1&no_peer_id=1",
                "%AB".repeat(20)
            )
        );
    }

    #[test]
    fn update_announces_omit_the_event() {
        let accessor = BencodeAnnounceAccessor::with_key(50, 1);
        let torrent = torrent("https://tracker.test/announce?passkey=abc");
        let request = accessor
            .build_request(&torrent, &stats(&torrent), AnnounceEvent::Update)
            .expect("request");

        assert!(request.url.starts_with("https://tracker.test/announce?passkey=abc&info_hash="));
        assert!(!request.url.contains("event="));
    }

    #[test]
    fn non_http_trackers_are_rejected() {
        let accessor = BencodeAnnounceAccessor::new(50);
        for url in ["udp://tracker.test:6969", "not a url"] {
            let torrent = torrent(url);
            let err = accessor
                .build_request(&torrent, &stats(&torrent), AnnounceEvent::Started)
                .unwrap_err();
            assert_eq!(err.label(), "invalid_request");
        }
    }

    #[test]
    fn reply_fields_are_decoded() {
        let accessor = BencodeAnnounceAccessor::new(50);
        let result = accessor
            .parse_response(
                b"d8:completei12e10:incompletei3e8:intervali1800e12:min intervali900e\
                  5:peers0:10:tracker id3:xyz15:warning message4:slowe",
            )
            .expect("reply");

        assert_eq!(result.interval_secs, 1_800);
        assert_eq!(result.min_interval_secs, Some(900));
        assert_eq!(result.seeders, 12);
        assert_eq!(result.leechers, 3);
        assert_eq!(result.tracker_id.as_deref(), Some("xyz"));
        assert_eq!(result.warning_message.as_deref(), Some("slow"));
    }

    #[test]
    fn short_intervals_are_clamped_and_counts_default() {
        let accessor = BencodeAnnounceAccessor::new(50);
        let result = accessor.parse_response(b"d8:intervali5ee").expect("reply");
        assert_eq!(result.interval_secs, MIN_TRACKER_INTERVAL_SECS);
        assert_eq!(result.seeders, 0);
        assert_eq!(result.leechers, 0);
    }

    #[test]
    fn huge_intervals_are_capped() {
        let accessor = BencodeAnnounceAccessor::new(50);
        let result = accessor
            .parse_response(b"d8:intervali9223372036854775807e12:min intervali9223372036854775807ee")
            .expect("reply");
        assert_eq!(result.interval_secs, MAX_TRACKER_INTERVAL_SECS);
        assert_eq!(result.min_interval_secs, Some(MAX_TRACKER_INTERVAL_SECS));
    }

    #[test]
    fn failure_reason_is_a_tracker_failure() {
        let accessor = BencodeAnnounceAccessor::new(50);
        let err = accessor
            .parse_response(b"d14:failure reason20:unregistered torrente")
            .unwrap_err();
        assert_eq!(
            err,
            AnnounceError::TrackerFailure {
                reason: "unregistered torrent".into()
            }
        );
    }

    #[test]
    fn malformed_replies_are_decode_errors() {
        let accessor = BencodeAnnounceAccessor::new(50);
        assert_eq!(
            accessor.parse_response(b"<html>").unwrap_err().label(),
            "decode"
        );
        assert_eq!(
            accessor.parse_response(b"d8:completei1ee").unwrap_err().label(),
            "decode"
        );
    }
}
