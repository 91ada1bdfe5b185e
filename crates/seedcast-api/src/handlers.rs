//! Route handlers under `/ui`.

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, Uri, header::CONTENT_TYPE},
    response::{Redirect, Response},
};
use seedcast_announcer::{AnnouncerError, AnnouncerSnapshot};
use seedcast_core::InfoHash;
use seedcast_events::EventEnvelope;
use seedcast_telemetry::build_sha;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::ApiError;
use crate::state::AdminState;

const DEFAULT_EVENT_LIMIT: usize = 50;
const MAX_EVENT_LIMIT: usize = 500;

#[derive(Serialize)]
pub(crate) struct RateView {
    pub(crate) min_kbps: u64,
    pub(crate) max_kbps: u64,
}

#[derive(Serialize)]
pub(crate) struct OverviewResponse {
    pub(crate) build: &'static str,
    pub(crate) config_revision: u64,
    pub(crate) torrents: usize,
    pub(crate) active_announcers: i64,
    pub(crate) simulated_uploaded_bytes_total: u64,
    pub(crate) upload_rate: RateView,
    pub(crate) upload_ratio_target: f64,
}

#[derive(Deserialize)]
pub(crate) struct EventsQuery {
    limit: Option<usize>,
}

fn parse_info_hash(raw: &str) -> Result<InfoHash, ApiError> {
    InfoHash::from_hex(raw)
        .ok_or_else(|| ApiError::bad_request().with_detail("info hash must be 40 hex digits"))
}

pub(crate) async fn root(uri: Uri) -> Redirect {
    match uri.query() {
        Some(query) => Redirect::to(&format!("/ui/?{query}")),
        None => Redirect::to("/ui/"),
    }
}

pub(crate) async fn overview(State(state): State<Arc<AdminState>>) -> Json<OverviewResponse> {
    let config = state.config.current();
    let metrics = state.metrics.snapshot();
    Json(OverviewResponse {
        build: build_sha(),
        config_revision: state.config.revision(),
        torrents: state.supervisor.info_hashes().await.len(),
        active_announcers: metrics.active_announcers,
        simulated_uploaded_bytes_total: metrics.simulated_uploaded_bytes_total,
        upload_rate: RateView {
            min_kbps: config.rates.min_upload_rate,
            max_kbps: config.rates.max_upload_rate,
        },
        upload_ratio_target: config.upload_ratio_target,
    })
}

pub(crate) async fn list_torrents(
    State(state): State<Arc<AdminState>>,
) -> Json<Vec<AnnouncerSnapshot>> {
    Json(state.supervisor.snapshots().await)
}

pub(crate) async fn get_torrent(
    State(state): State<Arc<AdminState>>,
    Path(raw): Path<String>,
) -> Result<Json<AnnouncerSnapshot>, ApiError> {
    let info_hash = parse_info_hash(&raw)?;
    state
        .supervisor
        .snapshot(&info_hash)
        .await
        .map(Json)
        .ok_or_else(ApiError::not_found)
}

pub(crate) async fn reannounce(
    State(state): State<Arc<AdminState>>,
    Path(raw): Path<String>,
) -> Result<StatusCode, ApiError> {
    let info_hash = parse_info_hash(&raw)?;
    match state.supervisor.reannounce(&info_hash).await {
        Ok(true) => {
            info!(%info_hash, "reannounce requested");
            Ok(StatusCode::ACCEPTED)
        }
        Ok(false) => Err(ApiError::not_found()),
        Err(AnnouncerError::CommandChannelClosed { .. }) => {
            Err(ApiError::conflict().with_detail("announcer has stopped"))
        }
        Err(err) => {
            error!(%info_hash, error = %err, "reannounce failed");
            Err(ApiError::internal())
        }
    }
}

pub(crate) async fn recent_events(
    State(state): State<Arc<AdminState>>,
    Query(query): Query<EventsQuery>,
) -> Json<Vec<EventEnvelope>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .min(MAX_EVENT_LIMIT);
    Json(state.events.recent(limit))
}

pub(crate) async fn metrics(State(state): State<Arc<AdminState>>) -> Result<Response, ApiError> {
    let body = state.metrics.render().map_err(|err| {
        error!(error = %err, "failed to render metrics");
        ApiError::internal()
    })?;
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(Body::from(body))
        .map_err(|err| {
            error!(error = %err, "failed to build metrics response");
            ApiError::internal()
        })
}

pub(crate) async fn fallback(uri: Uri) -> ApiError {
    if uri.path().starts_with("/ui/") {
        ApiError::not_found()
    } else {
        ApiError::forbidden()
    }
}
