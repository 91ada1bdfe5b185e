//! Router construction and server host for the admin surface.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    Router,
    http::Request,
    routing::{get, post},
};
use seedcast_telemetry::build_sha;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::handlers::{
    fallback, get_torrent, list_torrents, metrics, overview, reannounce, recent_events, root,
};
use crate::sse::stream_events;
use crate::state::AdminState;

/// Axum router wrapper hosting the admin routes.
pub struct AdminServer {
    router: Router,
}

impl AdminServer {
    /// Build the router over `state`.
    #[must_use]
    pub fn new(state: AdminState) -> Self {
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );

        let router = Router::new()
            .route("/", get(root))
            .route("/ui", get(root))
            .route("/ui/", get(overview))
            .route("/ui/torrents", get(list_torrents))
            .route("/ui/torrents/{info_hash}", get(get_torrent))
            .route("/ui/torrents/{info_hash}/reannounce", post(reannounce))
            .route("/ui/events", get(recent_events))
            .route("/ui/events/stream", get(stream_events))
            .route("/ui/metrics", get(metrics))
            .fallback(fallback)
            .layer(trace_layer)
            .with_state(Arc::new(state));

        Self { router }
    }

    /// Router for in-process use.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `addr` until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server terminates unexpectedly.
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "admin surface listening");
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}
