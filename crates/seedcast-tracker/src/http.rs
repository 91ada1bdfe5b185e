//! `reqwest` transport for HTTP(S) trackers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use seedcast_core::{AnnounceError, AnnounceRequest, Transport, TransportErrorKind};
use tracing::debug;

use crate::error::{TrackerError, TrackerResult};

const USER_AGENT: &str = concat!("seedcast/", env!("CARGO_PKG_VERSION"));

/// Sends announces over a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::HttpClient`] when the TLS backend cannot initialise.
    pub fn new() -> TrackerResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|source| TrackerError::HttpClient { source })?;
        Ok(Self::with_client(client))
    }

    /// Wrap an existing client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn request_failure(err: &reqwest::Error) -> AnnounceError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else {
        TransportErrorKind::Connect
    };
    AnnounceError::transport(kind, err.to_string())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &AnnounceRequest,
        timeout: Duration,
    ) -> Result<Vec<u8>, AnnounceError> {
        debug!(event = %request.event, "sending announce");
        let response = self
            .client
            .get(&request.url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| request_failure(&err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnnounceError::transport(
                TransportErrorKind::Status {
                    code: status.as_u16(),
                },
                status.canonical_reason().unwrap_or("unexpected status"),
            ));
        }

        let body = response.bytes().await.map_err(|err| {
            if err.is_timeout() {
                request_failure(&err)
            } else {
                AnnounceError::transport(TransportErrorKind::Body, err.to_string())
            }
        })?;
        Ok(body.to_vec())
    }
}
