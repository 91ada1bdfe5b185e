//! Collaborator interfaces the announce engine depends on.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AnnounceError;
use crate::model::{AnnounceEvent, AnnounceResult, SimulatedStats, TorrentIdentity};

/// Wire-level announce request ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceRequest {
    /// Fully assembled request URL.
    pub url: String,
    /// Event the request reports.
    pub event: AnnounceEvent,
}

/// Builds announce requests and decodes tracker replies.
///
/// Implementations are shared by every announcer and must not hold per-torrent state.
pub trait AnnounceDataAccessor: Send + Sync {
    /// Build the request for `event` reporting `stats`.
    ///
    /// # Errors
    ///
    /// Returns [`AnnounceError::InvalidRequest`] when the torrent's announce URL is unusable.
    fn build_request(
        &self,
        torrent: &TorrentIdentity,
        stats: &SimulatedStats,
        event: AnnounceEvent,
    ) -> Result<AnnounceRequest, AnnounceError>;

    /// Decode a raw tracker reply.
    ///
    /// # Errors
    ///
    /// Returns [`AnnounceError::ProtocolDecode`] for malformed replies.
    fn parse_response(&self, body: &[u8]) -> Result<AnnounceResult, AnnounceError>;
}

/// Delivers announce requests to a tracker.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the raw reply body.
    ///
    /// # Errors
    ///
    /// Returns [`AnnounceError::Transport`] on connection failures, timeouts, or
    /// non-success statuses.
    async fn send(
        &self,
        request: &AnnounceRequest,
        timeout: Duration,
    ) -> Result<Vec<u8>, AnnounceError>;
}
