use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header::LOCATION};
use seedcast_announcer::{AnnouncerFactory, AnnouncerSupervisor};
use seedcast_api::{AdminServer, AdminState};
use seedcast_config::ConfigProvider;
use seedcast_core::{InfoHash, PeerId};
use seedcast_events::EventBus;
use seedcast_telemetry::Metrics;
use seedcast_test_support::fixtures::{config, torrent};
use seedcast_test_support::mocks::{RecordingAccessor, ScriptedReply, ScriptedTransport};
use futures_util::StreamExt;
use serde_json::Value;
use tower::ServiceExt;

struct Admin {
    router: Router,
    supervisor: Arc<AnnouncerSupervisor>,
    transport: Arc<ScriptedTransport>,
}

async fn admin() -> Admin {
    let transport = Arc::new(ScriptedTransport::with_fallback(ScriptedReply::tracker(
        1_800, 3, 2,
    )));
    let config = ConfigProvider::new(config(50, 2.0)).expect("valid config");
    let events = EventBus::with_capacity(64);
    let metrics = Metrics::new().expect("metrics");
    let factory = AnnouncerFactory::new(
        Arc::new(RecordingAccessor::new()),
        transport.clone(),
        config.clone(),
        events.clone(),
        metrics.clone(),
        PeerId::generate(),
    );
    let supervisor = Arc::new(AnnouncerSupervisor::new(factory, events.clone()));
    supervisor
        .add_torrent(torrent(9, 1_000))
        .await
        .expect("torrent added");
    transport.wait_for_requests(1).await;

    let server = AdminServer::new(AdminState::new(
        supervisor.clone(),
        config,
        events,
        metrics,
    ));
    Admin {
        router: server.router(),
        supervisor,
        transport,
    }
}

async fn call(router: &Router, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("infallible");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, body.to_vec())
}

fn json(body: &[u8]) -> Value {
    serde_json::from_slice(body).expect("json body")
}

#[tokio::test]
async fn root_redirects_to_ui() {
    let admin = admin().await;
    let response = admin
        .router
        .clone()
        .oneshot(Request::get("/").body(Body::empty()).expect("request"))
        .await
        .expect("infallible");

    assert!(response.status().is_redirection());
    assert_eq!(
        response.headers().get(LOCATION).map(|value| value.as_bytes()),
        Some(&b"/ui/"[..])
    );
    admin.supervisor.shutdown().await;
}

#[tokio::test]
async fn ui_redirect_keeps_query_string() {
    let admin = admin().await;
    let response = admin
        .router
        .clone()
        .oneshot(
            Request::get("/ui?tab=torrents&sort=name")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("infallible");

    assert!(response.status().is_redirection());
    assert_eq!(
        response.headers().get(LOCATION).map(|value| value.as_bytes()),
        Some(&b"/ui/?tab=torrents&sort=name"[..])
    );
    admin.supervisor.shutdown().await;
}

#[tokio::test]
async fn overview_reports_configuration_and_counts() {
    let admin = admin().await;
    let (status, body) = call(&admin.router, Method::GET, "/ui/").await;

    assert_eq!(status, StatusCode::OK);
    let overview = json(&body);
    assert_eq!(overview["torrents"], 1);
    assert_eq!(overview["config_revision"], 1);
    assert_eq!(overview["upload_rate"]["min_kbps"], 50);
    assert_eq!(overview["upload_ratio_target"], 2.0);
    admin.supervisor.shutdown().await;
}

#[tokio::test]
async fn torrents_are_listed_and_addressable() {
    let admin = admin().await;
    let info_hash = InfoHash::new([9; 20]);

    let (status, body) = call(&admin.router, Method::GET, "/ui/torrents").await;
    assert_eq!(status, StatusCode::OK);
    let listed = json(&body);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["name"], "fixture-9.iso");
    assert_eq!(listed[0]["info_hash"], info_hash.to_string());

    let (status, body) = call(&admin.router, Method::GET, &format!("/ui/torrents/{info_hash}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["ratio_target"], 2.0);

    let unknown = InfoHash::new([1; 20]);
    let (status, _) = call(&admin.router, Method::GET, &format!("/ui/torrents/{unknown}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&admin.router, Method::GET, "/ui/torrents/not-a-hash").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    admin.supervisor.shutdown().await;
}

#[tokio::test]
async fn reannounce_is_forwarded() {
    let admin = admin().await;
    let info_hash = InfoHash::new([9; 20]);

    let (status, _) = call(
        &admin.router,
        Method::POST,
        &format!("/ui/torrents/{info_hash}/reannounce"),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    admin.transport.wait_for_requests(2).await;
    assert_eq!(admin.transport.request_count(), 2);
    admin.supervisor.shutdown().await;
}

#[tokio::test]
async fn metrics_and_events_are_exposed() {
    let admin = admin().await;

    let (status, body) = call(&admin.router, Method::GET, "/ui/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).expect("utf8");
    assert!(text.contains("announces_total"));
    assert!(text.contains("active_announcers 1"));

    let (status, body) = call(&admin.router, Method::GET, "/ui/events?limit=10").await;
    assert_eq!(status, StatusCode::OK);
    let events = json(&body);
    assert_eq!(events[0]["event"]["type"], "announcer_started");
    admin.supervisor.shutdown().await;
}

#[tokio::test]
async fn paths_outside_ui_are_forbidden() {
    let admin = admin().await;
    for uri in ["/api/torrents", "/admin", "/uix"] {
        let (status, _) = call(&admin.router, Method::GET, uri).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
    }
    let (status, _) = call(&admin.router, Method::GET, "/ui/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    admin.supervisor.shutdown().await;
}

async fn next_frame(body: &mut axum::body::BodyDataStream) -> String {
    let chunk = tokio::time::timeout(std::time::Duration::from_secs(2), body.next())
        .await
        .expect("sse frame in time")
        .expect("stream open")
        .expect("frame readable");
    String::from_utf8(chunk.to_vec()).expect("utf8 frame")
}

#[tokio::test]
async fn event_stream_replays_and_follows_live_events() {
    let admin = admin().await;
    let response = admin
        .router
        .clone()
        .oneshot(
            Request::get("/ui/events/stream?event=announcer_started,announce_succeeded")
                .header("last-event-id", "0")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("infallible");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .map(|value| value.as_bytes()),
        Some(&b"text/event-stream"[..])
    );

    let mut body = response.into_body().into_data_stream();
    let first = next_frame(&mut body).await;
    assert!(first.contains("announcer_started"), "{first}");
    assert!(first.contains("\"id\":1,"), "{first}");
    let second = next_frame(&mut body).await;
    assert!(second.contains("announce_succeeded"), "{second}");

    let info_hash = InfoHash::new([9; 20]);
    assert!(admin.supervisor.reannounce(&info_hash).await.expect("reannounce"));
    let live = next_frame(&mut body).await;
    assert!(live.contains("announce_succeeded"), "{live}");
    assert!(live.contains("\"event\":\"update\""), "{live}");
    admin.supervisor.shutdown().await;
}

#[tokio::test]
async fn event_stream_rejects_unknown_filters() {
    let admin = admin().await;
    let (status, _) = call(&admin.router, Method::GET, "/ui/events/stream?event=progress").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(&admin.router, Method::GET, "/ui/events/stream?torrent=xyz").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    admin.supervisor.shutdown().await;
}
