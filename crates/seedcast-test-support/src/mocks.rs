//! Scripted tracker doubles for announce engine tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use seedcast_core::{
    AnnounceDataAccessor, AnnounceError, AnnounceEvent, AnnounceRequest, AnnounceResult,
    SimulatedStats, TorrentIdentity, Transport, TransportErrorKind,
};
use tokio::sync::Notify;
use tokio::time::Instant;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Canned transport behaviour for one request.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Return this body.
    Body(Vec<u8>),
    /// Never answer; the caller's timeout decides.
    Hang,
    /// Fail with this error.
    Fail(AnnounceError),
}

impl ScriptedReply {
    /// Successful reply decoded by [`RecordingAccessor`].
    #[must_use]
    pub fn tracker(interval_secs: u64, seeders: u32, leechers: u32) -> Self {
        Self::result(&AnnounceResult {
            interval_secs,
            seeders,
            leechers,
            ..AnnounceResult::default()
        })
    }

    /// Reply carrying an arbitrary decoded result.
    #[must_use]
    pub fn result(result: &AnnounceResult) -> Self {
        Self::Body(serde_json::to_vec(result).unwrap_or_default())
    }

    /// Reply carrying a tracker failure reason.
    #[must_use]
    pub fn tracker_failure(reason: &str) -> Self {
        Self::result(&AnnounceResult {
            failure_reason: Some(reason.to_string()),
            ..AnnounceResult::default()
        })
    }

    /// Connection refused.
    #[must_use]
    pub fn refused() -> Self {
        Self::Fail(AnnounceError::transport(
            TransportErrorKind::Connect,
            "connection refused",
        ))
    }
}

/// Request observed by [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request as sent.
    pub request: AnnounceRequest,
    /// Timeout the caller supplied.
    pub timeout: Duration,
    /// Time the request was sent.
    pub at: Instant,
}

/// Transport that replays queued replies and records every request.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<ScriptedReply>>,
    fallback: Mutex<Option<ScriptedReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
    notify: Notify,
}

impl ScriptedTransport {
    /// Transport with an empty script; unscripted requests are refused.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport answering every unscripted request with `reply`.
    #[must_use]
    pub fn with_fallback(reply: ScriptedReply) -> Self {
        let transport = Self::default();
        *lock(&transport.fallback) = Some(reply);
        transport
    }

    /// Queue a reply for the next unanswered request.
    pub fn push(&self, reply: ScriptedReply) {
        lock(&self.replies).push_back(reply);
    }

    /// Every request seen so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Events of every request seen so far.
    #[must_use]
    pub fn events(&self) -> Vec<AnnounceEvent> {
        lock(&self.requests)
            .iter()
            .map(|recorded| recorded.request.event)
            .collect()
    }

    /// Number of requests seen so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Wait until at least `count` requests were sent.
    pub async fn wait_for_requests(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.request_count() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &AnnounceRequest,
        timeout: Duration,
    ) -> Result<Vec<u8>, AnnounceError> {
        lock(&self.requests).push(RecordedRequest {
            request: request.clone(),
            timeout,
            at: Instant::now(),
        });
        self.notify.notify_waiters();

        let scripted = lock(&self.replies).pop_front();
        let reply = scripted.or_else(|| lock(&self.fallback).clone());
        match reply {
            Some(ScriptedReply::Body(body)) => Ok(body),
            Some(ScriptedReply::Fail(err)) => Err(err),
            Some(ScriptedReply::Hang) => std::future::pending().await,
            None => Err(AnnounceError::transport(
                TransportErrorKind::Connect,
                "no scripted reply",
            )),
        }
    }
}

/// Request built by [`RecordingAccessor`].
#[derive(Debug, Clone)]
pub struct RecordedAnnounce {
    /// Reported event.
    pub event: AnnounceEvent,
    /// Reported counters.
    pub stats: SimulatedStats,
    /// Time the request was built.
    pub at: Instant,
}

/// Accessor that records structured requests and decodes JSON-encoded results.
#[derive(Debug, Default)]
pub struct RecordingAccessor {
    announces: Mutex<Vec<RecordedAnnounce>>,
}

impl RecordingAccessor {
    /// Empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request built so far.
    #[must_use]
    pub fn announces(&self) -> Vec<RecordedAnnounce> {
        lock(&self.announces).clone()
    }

    /// Uploaded counters of every request built so far.
    #[must_use]
    pub fn uploaded(&self) -> Vec<u64> {
        lock(&self.announces)
            .iter()
            .map(|announce| announce.stats.uploaded)
            .collect()
    }
}

impl AnnounceDataAccessor for RecordingAccessor {
    fn build_request(
        &self,
        torrent: &TorrentIdentity,
        stats: &SimulatedStats,
        event: AnnounceEvent,
    ) -> Result<AnnounceRequest, AnnounceError> {
        lock(&self.announces).push(RecordedAnnounce {
            event,
            stats: stats.clone(),
            at: Instant::now(),
        });
        Ok(AnnounceRequest {
            url: format!(
                "{}?info_hash={}&event={event}&uploaded={}",
                torrent.announce_url, torrent.info_hash, stats.uploaded
            ),
            event,
        })
    }

    fn parse_response(&self, body: &[u8]) -> Result<AnnounceResult, AnnounceError> {
        serde_json::from_slice(body).map_err(|err| AnnounceError::decode(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::torrent;
    use seedcast_core::{PeerId, ResumeStats};

    fn request() -> AnnounceRequest {
        AnnounceRequest {
            url: "http://tracker.test/announce".into(),
            event: AnnounceEvent::Started,
        }
    }

    #[tokio::test]
    async fn scripted_replies_are_consumed_in_order() {
        let transport = ScriptedTransport::with_fallback(ScriptedReply::tracker(60, 1, 1));
        transport.push(ScriptedReply::refused());

        let first = transport.send(&request(), Duration::from_secs(1)).await;
        let second = transport.send(&request(), Duration::from_secs(1)).await;
        assert!(matches!(first, Err(AnnounceError::Transport { .. })));
        assert!(second.is_ok());
        assert_eq!(transport.request_count(), 2);
        transport.wait_for_requests(2).await;
    }

    #[tokio::test]
    async fn unscripted_requests_are_refused() {
        let transport = ScriptedTransport::new();
        let result = transport.send(&request(), Duration::from_secs(1)).await;
        assert!(result.is_err());
    }

    #[test]
    fn recording_accessor_round_trips_results() -> anyhow::Result<()> {
        let accessor = RecordingAccessor::new();
        let fixture = torrent(3, 1_000);
        let stats = SimulatedStats::initial(&fixture, ResumeStats::default(), PeerId::generate(), 1);
        let built = accessor.build_request(&fixture, &stats, AnnounceEvent::Update)?;
        assert!(built.url.contains("event=update"));
        assert_eq!(accessor.uploaded(), vec![0]);

        let ScriptedReply::Body(body) = ScriptedReply::tracker(900, 4, 2) else {
            anyhow::bail!("expected body");
        };
        let decoded = accessor.parse_response(&body)?;
        assert_eq!(decoded.interval_secs, 900);
        assert_eq!(decoded.leechers, 2);
        assert!(accessor.parse_response(b"garbage").is_err());
        Ok(())
    }
}
