use std::sync::Arc;
use std::time::Duration;

use seedcast_announcer::{AnnouncerFactory, AnnouncerState};
use seedcast_config::{AppConfig, ConfigProvider};
use seedcast_core::{AnnounceEvent, PeerId, ResumeStats, StopReason};
use seedcast_events::{Event, EventBus};
use seedcast_telemetry::{AnnounceOutcome, Metrics};
use seedcast_test_support::fixtures::{config, torrent};
use seedcast_test_support::mocks::{
    RecordedRequest, RecordingAccessor, ScriptedReply, ScriptedTransport,
};
use tokio::time::timeout;

const GUARD: Duration = Duration::from_secs(24 * 3_600);

struct Harness {
    transport: Arc<ScriptedTransport>,
    accessor: Arc<RecordingAccessor>,
    config: ConfigProvider,
    events: EventBus,
    metrics: Metrics,
    factory: AnnouncerFactory,
}

fn harness(app: AppConfig, transport: ScriptedTransport) -> anyhow::Result<Harness> {
    let transport = Arc::new(transport);
    let accessor = Arc::new(RecordingAccessor::new());
    let config = ConfigProvider::new(app)?;
    let events = EventBus::with_capacity(256);
    let metrics = Metrics::new()?;
    let factory = AnnouncerFactory::new(
        accessor.clone(),
        transport.clone(),
        config.clone(),
        events.clone(),
        metrics.clone(),
        PeerId::generate(),
    );
    Ok(Harness {
        transport,
        accessor,
        config,
        events,
        metrics,
        factory,
    })
}

fn gaps(requests: &[RecordedRequest]) -> Vec<Duration> {
    requests
        .windows(2)
        .map(|pair| pair[1].at.duration_since(pair[0].at))
        .collect()
}

fn assert_gaps(requests: &[RecordedRequest], expected_secs: &[u64]) {
    let actual = gaps(requests);
    assert_eq!(actual.len(), expected_secs.len(), "gaps: {actual:?}");
    for (gap, secs) in actual.iter().zip(expected_secs) {
        let expected = Duration::from_secs(*secs);
        assert!(
            *gap >= expected && *gap < expected + Duration::from_millis(10),
            "gap {gap:?} expected {expected:?} (all gaps: {actual:?})"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn ratio_target_stops_after_crediting_elapsed_upload() -> anyhow::Result<()> {
    let h = harness(
        config(50, 1.0),
        ScriptedTransport::with_fallback(ScriptedReply::tracker(10, 3, 2)),
    )?;
    let announcer = h.factory.create_with_stats(
        Arc::new(torrent(1, 1_000_000)),
        ResumeStats {
            uploaded: 0,
            downloaded: 500_000,
        },
    )?;

    let snapshot = timeout(GUARD, announcer.start().join()).await??;

    assert_eq!(
        h.transport.events(),
        vec![
            AnnounceEvent::Started,
            AnnounceEvent::Update,
            AnnounceEvent::Stopped
        ]
    );
    assert_eq!(h.accessor.uploaded(), vec![0, 500_000, 500_000]);
    assert_gaps(&h.transport.requests()[..2], &[10]);
    assert_eq!(snapshot.state, AnnouncerState::Stopped);
    assert_eq!(snapshot.stop_reason, Some(StopReason::RatioReached));
    assert_eq!(snapshot.stats.uploaded, 500_000);
    assert_eq!(snapshot.stats.left, 500_000);
    assert!(
        h.events
            .recent(64)
            .iter()
            .any(|envelope| matches!(envelope.event, Event::RatioReached { .. }))
    );
    assert_eq!(h.metrics.snapshot().simulated_uploaded_bytes_total, 500_000);
    assert_eq!(h.metrics.snapshot().active_announcers, 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn ratio_target_is_not_reread_after_creation() -> anyhow::Result<()> {
    let h = harness(
        config(50, 1.0),
        ScriptedTransport::with_fallback(ScriptedReply::tracker(10, 3, 2)),
    )?;
    let announcer = h.factory.create_with_stats(
        Arc::new(torrent(2, 1_000_000)),
        ResumeStats {
            uploaded: 0,
            downloaded: 500_000,
        },
    )?;
    h.config.replace(config(50, 0.0))?;

    let snapshot = timeout(GUARD, announcer.start().join()).await??;
    assert_eq!(snapshot.stop_reason, Some(StopReason::RatioReached));
    assert_eq!(h.transport.request_count(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn tracker_interval_is_honoured_over_shorter_floor() -> anyhow::Result<()> {
    let h = harness(
        config(50, 0.0),
        ScriptedTransport::with_fallback(ScriptedReply::tracker(1_800, 1, 1)),
    )?;
    let handle = h.factory.create(Arc::new(torrent(3, 1_000_000)))?.start();

    timeout(GUARD, h.transport.wait_for_requests(2)).await?;
    assert_gaps(&h.transport.requests(), &[1_800]);
    assert_eq!(h.accessor.uploaded(), vec![0, 90_000_000]);

    handle.stop(StopReason::Removed).await?;
    let snapshot = handle.join().await?;
    assert_eq!(snapshot.stop_reason, Some(StopReason::Removed));
    assert_eq!(
        h.transport.events(),
        vec![
            AnnounceEvent::Started,
            AnnounceEvent::Update,
            AnnounceEvent::Stopped
        ]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unbounded_tracker_interval_keeps_the_task_alive() -> anyhow::Result<()> {
    let h = harness(
        config(50, 0.0),
        ScriptedTransport::with_fallback(ScriptedReply::tracker(u64::MAX, 3, 2)),
    )?;
    let handle = h.factory.create(Arc::new(torrent(20, 1_000_000)))?.start();
    let mut updates = handle.subscribe();

    timeout(
        GUARD,
        updates.wait_for(|snapshot| snapshot.state == AnnouncerState::Running),
    )
    .await??;
    assert!(!handle.is_finished());
    assert!(handle.snapshot().next_announce_at.is_some());

    handle.stop(StopReason::Removed).await?;
    let snapshot = timeout(GUARD, handle.join()).await??;
    assert_eq!(snapshot.stop_reason, Some(StopReason::Removed));
    assert_eq!(
        h.transport.events(),
        vec![AnnounceEvent::Started, AnnounceEvent::Stopped]
    );
    assert_eq!(h.metrics.snapshot().active_announcers, 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn configured_floor_applies_to_short_tracker_intervals() -> anyhow::Result<()> {
    let mut app = config(50, 0.0);
    app.announce.min_announce_interval_secs = 120;
    let h = harness(
        app,
        ScriptedTransport::with_fallback(ScriptedReply::tracker(30, 1, 1)),
    )?;
    let handle = h.factory.create(Arc::new(torrent(4, 1_000_000)))?.start();

    timeout(GUARD, h.transport.wait_for_requests(3)).await?;
    assert_gaps(&h.transport.requests(), &[120, 120]);
    assert_eq!(h.accessor.uploaded(), vec![0, 6_000_000, 12_000_000]);

    handle.stop(StopReason::Removed).await?;
    handle.join().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failures_back_off_without_touching_counters() -> anyhow::Result<()> {
    let transport = ScriptedTransport::with_fallback(ScriptedReply::tracker(1_800, 1, 1));
    for _ in 0..5 {
        transport.push(ScriptedReply::refused());
    }
    let h = harness(config(50, 0.0), transport)?;
    let handle = h
        .factory
        .create_with_stats(
            Arc::new(torrent(5, 1_000_000)),
            ResumeStats {
                uploaded: 1_234,
                downloaded: 0,
            },
        )?
        .start();

    timeout(GUARD, h.transport.wait_for_requests(6)).await?;
    assert_gaps(&h.transport.requests(), &[5, 10, 20, 40, 40]);
    assert!(
        h.transport
            .events()
            .iter()
            .all(|event| *event == AnnounceEvent::Started)
    );
    assert_eq!(h.accessor.uploaded(), vec![1_234; 6]);

    let mut snapshots = handle.subscribe();
    let running = timeout(
        GUARD,
        snapshots.wait_for(|snapshot| snapshot.state == AnnouncerState::Running),
    )
    .await??
    .clone();
    assert_eq!(running.consecutive_failures, 0);
    assert_eq!(running.stats.uploaded, 1_234);
    assert_eq!(
        h.metrics
            .announce_count("started", AnnounceOutcome::Failure),
        5
    );

    let last_failure = h
        .events
        .recent(64)
        .into_iter()
        .filter_map(|envelope| match envelope.event {
            Event::AnnounceFailed {
                consecutive_failures,
                retry_in_secs,
                ..
            } => Some((consecutive_failures, retry_in_secs)),
            _ => None,
        })
        .last();
    assert_eq!(last_failure, Some((5, 40)));

    handle.stop(StopReason::Removed).await?;
    handle.join().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn request_timeout_is_a_retryable_failure() -> anyhow::Result<()> {
    let transport = ScriptedTransport::with_fallback(ScriptedReply::tracker(1_800, 1, 1));
    transport.push(ScriptedReply::Hang);
    let h = harness(config(50, 0.0), transport)?;
    let handle = h.factory.create(Arc::new(torrent(6, 1_000_000)))?.start();

    timeout(GUARD, h.transport.wait_for_requests(2)).await?;
    assert_gaps(&h.transport.requests(), &[15]);
    assert!(h.events.recent(64).iter().any(|envelope| matches!(
        &envelope.event,
        Event::AnnounceFailed { error, .. } if error == "timeout"
    )));

    handle.stop(StopReason::Removed).await?;
    handle.join().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn tracker_failure_reason_is_retried_with_same_event() -> anyhow::Result<()> {
    let transport = ScriptedTransport::with_fallback(ScriptedReply::tracker(1_800, 1, 1));
    transport.push(ScriptedReply::tracker_failure("unregistered torrent"));
    let h = harness(config(50, 0.0), transport)?;
    let handle = h.factory.create(Arc::new(torrent(7, 1_000_000)))?.start();

    timeout(GUARD, h.transport.wait_for_requests(2)).await?;
    assert_eq!(
        h.transport.events(),
        vec![AnnounceEvent::Started, AnnounceEvent::Started]
    );
    assert_gaps(&h.transport.requests(), &[5]);

    handle.stop(StopReason::Removed).await?;
    handle.join().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_interrupts_in_flight_request_and_skips_unregistered_stop() -> anyhow::Result<()> {
    let transport = ScriptedTransport::new();
    transport.push(ScriptedReply::Hang);
    let h = harness(config(50, 0.0), transport)?;
    let handle = h.factory.create(Arc::new(torrent(8, 1_000_000)))?.start();

    timeout(GUARD, h.transport.wait_for_requests(1)).await?;
    handle.stop(StopReason::Removed).await?;
    let snapshot = timeout(Duration::from_secs(1), handle.join()).await??;

    assert_eq!(snapshot.state, AnnouncerState::Stopped);
    assert_eq!(snapshot.consecutive_failures, 0);
    assert_eq!(h.transport.events(), vec![AnnounceEvent::Started]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn removal_sends_a_single_stopped_announce() -> anyhow::Result<()> {
    let h = harness(
        config(50, 0.0),
        ScriptedTransport::with_fallback(ScriptedReply::tracker(60, 1, 1)),
    )?;
    let handle = h.factory.create(Arc::new(torrent(9, 1_000_000)))?.start();

    timeout(GUARD, h.transport.wait_for_requests(1)).await?;
    handle.stop(StopReason::Removed).await?;
    let snapshot = handle.join().await?;

    assert_eq!(
        h.transport.events(),
        vec![AnnounceEvent::Started, AnnounceEvent::Stopped]
    );
    let requests = h.transport.requests();
    assert_eq!(requests[1].timeout, Duration::from_secs(2));
    assert_eq!(snapshot.stop_reason, Some(StopReason::Removed));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn zero_leechers_withhold_upload_credit() -> anyhow::Result<()> {
    let h = harness(
        config(50, 0.0),
        ScriptedTransport::with_fallback(ScriptedReply::tracker(10, 5, 0)),
    )?;
    let handle = h.factory.create(Arc::new(torrent(10, 1_000_000)))?.start();

    timeout(GUARD, h.transport.wait_for_requests(3)).await?;
    assert_eq!(h.accessor.uploaded(), vec![0, 0, 0]);

    handle.stop(StopReason::Removed).await?;
    handle.join().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn upload_is_credited_without_leechers_when_not_required() -> anyhow::Result<()> {
    let mut app = config(50, 0.0);
    app.announce.require_leechers = false;
    let h = harness(
        app,
        ScriptedTransport::with_fallback(ScriptedReply::tracker(10, 5, 0)),
    )?;
    let handle = h.factory.create(Arc::new(torrent(11, 1_000_000)))?.start();

    timeout(GUARD, h.transport.wait_for_requests(3)).await?;
    assert_eq!(h.accessor.uploaded(), vec![0, 500_000, 1_000_000]);

    handle.stop(StopReason::Removed).await?;
    handle.join().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn reannounce_skips_the_remaining_interval() -> anyhow::Result<()> {
    let h = harness(
        config(50, 0.0),
        ScriptedTransport::with_fallback(ScriptedReply::tracker(1_800, 1, 1)),
    )?;
    let handle = h.factory.create(Arc::new(torrent(12, 1_000_000)))?.start();

    timeout(GUARD, h.transport.wait_for_requests(1)).await?;
    tokio::time::sleep(Duration::from_secs(30)).await;
    handle.reannounce().await?;
    timeout(GUARD, h.transport.wait_for_requests(2)).await?;

    assert_gaps(&h.transport.requests(), &[30]);
    assert_eq!(h.accessor.uploaded(), vec![0, 1_500_000]);

    handle.stop(StopReason::Removed).await?;
    handle.join().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn speed_is_redrawn_on_its_own_timer() -> anyhow::Result<()> {
    let h = harness(
        config(50, 0.0),
        ScriptedTransport::with_fallback(ScriptedReply::tracker(3_600, 1, 1)),
    )?;
    let handle = h.factory.create(Arc::new(torrent(13, 1_000_000)))?.start();
    timeout(GUARD, h.transport.wait_for_requests(1)).await?;
    assert_eq!(handle.snapshot().speed_bps, 50_000);

    h.config.replace(config(80, 0.0))?;
    tokio::time::sleep(Duration::from_secs(1_201)).await;

    assert_eq!(handle.snapshot().speed_bps, 80_000);
    assert_eq!(h.transport.request_count(), 1);

    handle.stop(StopReason::Removed).await?;
    handle.join().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn speed_is_redrawn_on_request() -> anyhow::Result<()> {
    let h = harness(
        config(50, 0.0),
        ScriptedTransport::with_fallback(ScriptedReply::tracker(3_600, 1, 1)),
    )?;
    let handle = h.factory.create(Arc::new(torrent(15, 1_000_000)))?.start();
    timeout(GUARD, h.transport.wait_for_requests(1)).await?;

    h.config.replace(config(80, 0.0))?;
    handle.refresh_speed().await?;
    let mut snapshots = handle.subscribe();
    timeout(
        Duration::from_secs(1),
        snapshots.wait_for(|snapshot| snapshot.speed_bps == 80_000),
    )
    .await??;
    assert_eq!(h.transport.request_count(), 1);

    handle.stop(StopReason::Removed).await?;
    handle.join().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_the_task() -> anyhow::Result<()> {
    let h = harness(
        config(50, 0.0),
        ScriptedTransport::with_fallback(ScriptedReply::tracker(60, 1, 1)),
    )?;
    let handle = h.factory.create(Arc::new(torrent(14, 1_000_000)))?.start();
    timeout(GUARD, h.transport.wait_for_requests(1)).await?;
    let mut snapshots = handle.subscribe();
    drop(handle);

    timeout(
        GUARD,
        snapshots.wait_for(|snapshot| snapshot.state == AnnouncerState::Stopped),
    )
    .await??;
    assert_eq!(
        h.transport.events(),
        vec![AnnounceEvent::Started, AnnounceEvent::Stopped]
    );
    Ok(())
}
