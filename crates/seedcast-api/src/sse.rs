//! Live event push over server-sent events.

use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::sse::{self, Sse},
};
use futures_util::{StreamExt, future};
use seedcast_core::InfoHash;
use seedcast_events::{EventBus, EventEnvelope, EventId};
use serde::Deserialize;
use tracing::error;

use crate::error::ApiError;
use crate::state::AdminState;

const HEADER_LAST_EVENT_ID: &str = "last-event-id";
const SSE_KEEP_ALIVE_SECS: u64 = 20;
const EVENT_KINDS: [&str; 6] = [
    "announcer_started",
    "announce_succeeded",
    "announce_failed",
    "ratio_reached",
    "announcer_stopped",
    "settings_changed",
];

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SseQuery {
    #[serde(default)]
    torrent: Option<String>,
    #[serde(default)]
    event: Option<String>,
}

/// Which envelopes a subscriber wants; empty sets match everything.
#[derive(Debug, Default)]
pub(crate) struct SseFilter {
    info_hashes: HashSet<InfoHash>,
    event_kinds: HashSet<&'static str>,
}

impl SseFilter {
    fn matches(&self, envelope: &EventEnvelope) -> bool {
        if !self.event_kinds.is_empty() && !self.event_kinds.contains(envelope.event.kind()) {
            return false;
        }
        if self.info_hashes.is_empty() {
            return true;
        }
        envelope
            .event
            .info_hash()
            .is_some_and(|info_hash| self.info_hashes.contains(&info_hash))
    }
}

fn split_comma_separated(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|value| !value.is_empty())
}

pub(crate) fn build_sse_filter(query: &SseQuery) -> Result<SseFilter, ApiError> {
    let mut filter = SseFilter::default();

    if let Some(torrents) = query.torrent.as_deref() {
        for value in split_comma_separated(torrents) {
            let info_hash = InfoHash::from_hex(value).ok_or_else(|| {
                ApiError::bad_request()
                    .with_detail(format!("torrent filter '{value}' is not a 40 digit hex infohash"))
            })?;
            filter.info_hashes.insert(info_hash);
        }
    }

    if let Some(events) = query.event.as_deref() {
        for value in split_comma_separated(events) {
            let kind = EVENT_KINDS
                .iter()
                .copied()
                .find(|kind| *kind == value)
                .ok_or_else(|| {
                    ApiError::bad_request()
                        .with_detail(format!("event filter '{value}' is not recognised"))
                })?;
            filter.event_kinds.insert(kind);
        }
    }

    Ok(filter)
}

pub(crate) async fn stream_events(
    State(state): State<Arc<AdminState>>,
    headers: HeaderMap,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl futures_core::Stream<Item = Result<sse::Event, Infallible>> + Send>, ApiError>
{
    let last_id = headers
        .get(HEADER_LAST_EVENT_ID)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<EventId>().ok());
    let filter = build_sse_filter(&query)?;

    Ok(Sse::new(event_sse_stream(state.events.clone(), last_id, filter)).keep_alive(
        sse::KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEP_ALIVE_SECS))
            .text("keep-alive"),
    ))
}

/// Subscribes immediately so nothing published after the handler returns is missed.
pub(crate) fn event_replay_stream(
    bus: EventBus,
    since: Option<EventId>,
) -> impl futures_core::Stream<Item = EventEnvelope> + Send {
    let mut events = bus.subscribe(since);
    stream! {
        while let Some(envelope) = events.next().await {
            yield envelope;
        }
    }
}

pub(crate) fn event_sse_stream(
    bus: EventBus,
    since: Option<EventId>,
    filter: SseFilter,
) -> impl futures_core::Stream<Item = Result<sse::Event, Infallible>> + Send {
    event_replay_stream(bus, since)
        .filter(move |envelope| future::ready(filter.matches(envelope)))
        .filter_map(|envelope| async move {
            match serde_json::to_string(&envelope) {
                Ok(payload) => Some(Ok(sse::Event::default()
                    .id(envelope.id.to_string())
                    .event(envelope.event.kind())
                    .data(payload))),
                Err(err) => {
                    error!(error = %err, "failed to serialise SSE event payload");
                    None
                }
            }
        })
}
