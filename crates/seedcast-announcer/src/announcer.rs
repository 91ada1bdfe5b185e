//! Per-torrent announce state machine.
//!
//! # Design
//! - One tokio task per torrent owns the counters; other tasks only see snapshots.
//! - The two suspension points (waiting for the deadline, awaiting the tracker)
//!   are raced against the command channel so `Stop` always wins promptly.
//! - Counters change only after a successful announce; failures reschedule with backoff.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use seedcast_config::ConfigProvider;
use seedcast_core::{
    AnnounceDataAccessor, AnnounceError, AnnounceEvent, AnnounceResult, InfoHash, RatioTarget,
    SimulatedStats, StopReason, TorrentIdentity, Transport, TransportErrorKind,
};
use seedcast_events::{Event, EventBus};
use seedcast_telemetry::{AnnounceOutcome, Metrics};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until, timeout, timeout_at};
use tracing::{debug, info, warn};

use crate::command::AnnouncerCommand;
use crate::error::{AnnouncerError, AnnouncerResult};
use crate::retry::RetryPolicy;
use crate::speed::SpeedProvider;
use crate::state::{AnnouncerSnapshot, AnnouncerState};

const COMMAND_BUFFER: usize = 16;
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Instant `wait` from now, saturating at a far-future deadline.
pub(crate) fn deadline_after(wait: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(wait)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Collaborators shared by every announcer.
#[derive(Clone)]
pub struct AnnouncerDeps {
    /// Request builder and reply decoder.
    pub accessor: Arc<dyn AnnounceDataAccessor>,
    /// Tracker transport.
    pub transport: Arc<dyn Transport>,
    /// Live configuration.
    pub config: ConfigProvider,
    /// Domain event sink.
    pub events: EventBus,
    /// Metrics registry.
    pub metrics: Metrics,
}

enum Cycle {
    Next(Instant),
    Stop(StopReason),
}

/// Announce state machine for one torrent. Consumed by [`Announcer::start`].
pub struct Announcer {
    torrent: Arc<TorrentIdentity>,
    stats: SimulatedStats,
    ratio_target: RatioTarget,
    speed: SpeedProvider,
    deps: AnnouncerDeps,
    state: AnnouncerState,
    next_event: AnnounceEvent,
    consecutive_failures: u32,
    last_success: Option<Instant>,
    last_result: Option<AnnounceResult>,
    next_announce_at: Option<Instant>,
    stop_reason: Option<StopReason>,
    snapshots: watch::Sender<AnnouncerSnapshot>,
}

impl Announcer {
    pub(crate) fn new(
        torrent: Arc<TorrentIdentity>,
        stats: SimulatedStats,
        ratio_target: RatioTarget,
        speed: SpeedProvider,
        deps: AnnouncerDeps,
    ) -> Self {
        let placeholder = AnnouncerSnapshot {
            info_hash: torrent.info_hash,
            name: torrent.name.clone(),
            state: AnnouncerState::Idle,
            stats: stats.clone(),
            ratio: stats.ratio(),
            ratio_target: ratio_target.value(),
            speed_bps: speed.current_speed(),
            last_result: None,
            consecutive_failures: 0,
            next_announce_at: None,
            stop_reason: None,
        };
        let (snapshots, _) = watch::channel(placeholder);
        Self {
            torrent,
            stats,
            ratio_target,
            speed,
            deps,
            state: AnnouncerState::Idle,
            next_event: AnnounceEvent::Started,
            consecutive_failures: 0,
            last_success: None,
            last_result: None,
            next_announce_at: None,
            stop_reason: None,
            snapshots,
        }
    }

    /// Torrent this announcer reports on.
    #[must_use]
    pub fn torrent(&self) -> &Arc<TorrentIdentity> {
        &self.torrent
    }

    /// Current view of the announcer.
    #[must_use]
    pub fn snapshot(&self) -> AnnouncerSnapshot {
        AnnouncerSnapshot {
            info_hash: self.torrent.info_hash,
            name: self.torrent.name.clone(),
            state: self.state,
            stats: self.stats.clone(),
            ratio: self.stats.ratio(),
            ratio_target: self.ratio_target.value(),
            speed_bps: self.speed.current_speed(),
            last_result: self.last_result.clone(),
            consecutive_failures: self.consecutive_failures,
            next_announce_at: self.next_announce_at.and_then(wall_clock),
            stop_reason: self.stop_reason,
        }
    }

    /// Spawn the announce task and return its handle.
    #[must_use]
    pub fn start(self) -> AnnouncerHandle {
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        let snapshot = self.snapshots.subscribe();
        let torrent = Arc::clone(&self.torrent);
        let task = tokio::spawn(self.run(receiver));
        AnnouncerHandle {
            commands: AnnouncerCommands {
                info_hash: torrent.info_hash,
                sender: commands,
            },
            torrent,
            snapshot,
            task,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<AnnouncerCommand>) -> AnnouncerSnapshot {
        let info_hash = self.torrent.info_hash;
        self.deps.metrics.announcer_started();
        self.deps.events.publish(Event::AnnouncerStarted {
            info_hash,
            name: self.torrent.name.clone(),
        });
        info!(%info_hash, name = %self.torrent.name, speed_bps = self.speed.current_speed(), "announcer started");
        self.transition(AnnouncerState::Starting);

        let refresh_every = self.deps.config.current().announce.speed_refresh_interval();
        let mut speed_refresh = interval_at(deadline_after(refresh_every), refresh_every);
        speed_refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut deadline = Instant::now();
        let reason = loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(AnnouncerCommand::Stop { reason }) => break reason,
                    Some(AnnouncerCommand::RefreshSpeed) => self.refresh_speed(),
                    Some(AnnouncerCommand::Reannounce) => deadline = Instant::now(),
                    None => break StopReason::Removed,
                },
                _ = speed_refresh.tick() => self.refresh_speed(),
                () = sleep_until(deadline) => match self.announce_once(&mut commands).await {
                    Cycle::Next(at) => deadline = at,
                    Cycle::Stop(reason) => break reason,
                },
            }
        };

        self.shut_down(reason).await;
        self.deps.metrics.announcer_finished();
        self.snapshot()
    }

    async fn announce_once(&mut self, commands: &mut mpsc::Receiver<AnnouncerCommand>) -> Cycle {
        let event = self.next_event;
        let computed_at = Instant::now();
        let credit = self.pending_credit(computed_at);
        let mut pending = self.stats.clone();
        pending.uploaded = pending.uploaded.saturating_add(credit);

        let request = match self
            .deps
            .accessor
            .build_request(&self.torrent, &pending, event)
        {
            Ok(request) => request,
            Err(err) => return self.record_failure(event, &err),
        };

        let request_timeout = self.deps.config.current().announce.request_timeout();
        let transport = Arc::clone(&self.deps.transport);
        let send = timeout(request_timeout, transport.send(&request, request_timeout));
        tokio::pin!(send);

        let outcome = loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(AnnouncerCommand::Stop { reason }) => {
                        debug!(info_hash = %self.torrent.info_hash, %event, "in-flight announce interrupted");
                        return Cycle::Stop(reason);
                    }
                    Some(AnnouncerCommand::RefreshSpeed) => self.refresh_speed(),
                    Some(AnnouncerCommand::Reannounce) => {}
                    None => return Cycle::Stop(StopReason::Removed),
                },
                result = &mut send => break result,
            }
        };

        let body = match outcome {
            Ok(Ok(body)) => body,
            Ok(Err(err)) => return self.record_failure(event, &err),
            Err(_) => {
                let err = AnnounceError::transport(
                    TransportErrorKind::Timeout,
                    format!("no reply within {}s", request_timeout.as_secs()),
                );
                return self.record_failure(event, &err);
            }
        };

        let result = match self.deps.accessor.parse_response(&body) {
            Ok(result) => result,
            Err(err) => return self.record_failure(event, &err),
        };
        if let Some(reason) = result.failure_reason.clone() {
            return self.record_failure(event, &AnnounceError::TrackerFailure { reason });
        }

        self.record_success(event, pending, credit, result, computed_at)
    }

    /// Upload earned since the last successful announce at the current speed.
    fn pending_credit(&self, now: Instant) -> u64 {
        let Some(since) = self.last_success else {
            return 0;
        };
        let require_leechers = self.deps.config.current().announce.require_leechers;
        if require_leechers
            && self
                .last_result
                .as_ref()
                .is_some_and(|result| result.leechers == 0)
        {
            return 0;
        }
        let elapsed_ms = now.saturating_duration_since(since).as_millis();
        let bytes = u128::from(self.speed.current_speed()) * elapsed_ms / 1_000;
        u64::try_from(bytes).unwrap_or(u64::MAX)
    }

    fn record_success(
        &mut self,
        event: AnnounceEvent,
        pending: SimulatedStats,
        credit: u64,
        result: AnnounceResult,
        computed_at: Instant,
    ) -> Cycle {
        let info_hash = self.torrent.info_hash;
        self.stats = pending;
        self.last_success = Some(computed_at);
        self.consecutive_failures = 0;
        self.next_event = AnnounceEvent::Update;
        self.deps
            .metrics
            .record_announce(event.as_str(), AnnounceOutcome::Success);
        self.deps.metrics.add_uploaded_bytes(credit);

        let floor = self.deps.config.current().announce.min_announce_interval();
        let wait = result.interval().max(floor);
        if let Some(warning) = result.warning_message.as_deref() {
            warn!(%info_hash, warning, "tracker warning");
        }
        debug!(
            %info_hash,
            %event,
            uploaded = self.stats.uploaded,
            credit,
            seeders = result.seeders,
            leechers = result.leechers,
            next_in_secs = wait.as_secs(),
            "announce succeeded"
        );
        self.deps.events.publish(Event::AnnounceSucceeded {
            info_hash,
            event,
            uploaded: self.stats.uploaded,
            interval_secs: wait.as_secs(),
            seeders: result.seeders,
            leechers: result.leechers,
        });
        self.last_result = Some(result);

        if self.ratio_target.is_reached(&self.stats) {
            let ratio = self.stats.ratio();
            let target = self.ratio_target.value().unwrap_or_default();
            info!(%info_hash, ratio, target, "ratio target reached");
            self.deps.events.publish(Event::RatioReached {
                info_hash,
                ratio,
                target,
            });
            return Cycle::Stop(StopReason::RatioReached);
        }

        self.schedule(AnnouncerState::Running, wait)
    }

    fn record_failure(&mut self, event: AnnounceEvent, err: &AnnounceError) -> Cycle {
        let info_hash = self.torrent.info_hash;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let policy = RetryPolicy::from(&self.deps.config.current().announce);
        let delay = policy.delay(self.consecutive_failures);
        self.deps
            .metrics
            .record_announce(event.as_str(), AnnounceOutcome::Failure);
        warn!(
            %info_hash,
            %event,
            error = err.label(),
            detail = %err.detail(),
            failures = self.consecutive_failures,
            retry_in_secs = delay.as_secs(),
            "announce failed; retrying"
        );
        self.deps.events.publish(Event::AnnounceFailed {
            info_hash,
            event,
            error: err.label().to_string(),
            detail: err.detail(),
            consecutive_failures: self.consecutive_failures,
            retry_in_secs: delay.as_secs(),
        });
        self.schedule(AnnouncerState::Retrying, delay)
    }

    fn schedule(&mut self, state: AnnouncerState, wait: Duration) -> Cycle {
        let at = deadline_after(wait);
        self.next_announce_at = Some(at);
        self.transition(state);
        Cycle::Next(at)
    }

    async fn shut_down(&mut self, reason: StopReason) {
        let info_hash = self.torrent.info_hash;
        self.next_announce_at = None;
        self.stop_reason = Some(reason);
        self.transition(AnnouncerState::Stopping);

        if self.last_success.is_some() {
            self.announce_stopped().await;
        } else {
            debug!(%info_hash, "tracker never registered torrent; skipping stopped announce");
        }

        self.transition(AnnouncerState::Stopped);
        self.deps
            .events
            .publish(Event::AnnouncerStopped { info_hash, reason });
        info!(%info_hash, reason = reason.as_str(), uploaded = self.stats.uploaded, "announcer stopped");
    }

    /// Best-effort final announce; one attempt bounded by `stop_timeout`.
    async fn announce_stopped(&self) {
        let info_hash = self.torrent.info_hash;
        let event = AnnounceEvent::Stopped;
        let stop_timeout = self.deps.config.current().announce.stop_timeout();
        let outcome = match self
            .deps
            .accessor
            .build_request(&self.torrent, &self.stats, event)
        {
            Ok(request) => {
                match timeout(stop_timeout, self.deps.transport.send(&request, stop_timeout)).await
                {
                    Ok(Ok(body)) => self
                        .deps
                        .accessor
                        .parse_response(&body)
                        .and_then(|result| match result.failure_reason {
                            Some(reason) => Err(AnnounceError::TrackerFailure { reason }),
                            None => Ok(()),
                        }),
                    Ok(Err(err)) => Err(err),
                    Err(_) => Err(AnnounceError::transport(
                        TransportErrorKind::Timeout,
                        format!("no reply within {}s", stop_timeout.as_secs()),
                    )),
                }
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok(()) => self
                .deps
                .metrics
                .record_announce(event.as_str(), AnnounceOutcome::Success),
            Err(err) => {
                self.deps
                    .metrics
                    .record_announce(event.as_str(), AnnounceOutcome::Failure);
                warn!(
                    %info_hash,
                    error = err.label(),
                    detail = %err.detail(),
                    "stopped announce failed; giving up"
                );
            }
        }
    }

    fn refresh_speed(&mut self) {
        match self.speed.refresh() {
            Ok(speed_bps) => {
                debug!(info_hash = %self.torrent.info_hash, speed_bps, "simulated speed refreshed");
                self.publish_snapshot();
            }
            Err(err) => warn!(
                info_hash = %self.torrent.info_hash,
                error = ?err,
                "speed refresh rejected; keeping previous sample"
            ),
        }
    }

    fn transition(&mut self, state: AnnouncerState) {
        self.state = state;
        self.publish_snapshot();
    }

    fn publish_snapshot(&self) {
        self.snapshots.send_replace(self.snapshot());
    }
}

fn wall_clock(deadline: Instant) -> Option<DateTime<Utc>> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    let remaining = chrono::Duration::from_std(remaining).ok()?;
    Utc::now().checked_add_signed(remaining)
}

/// Cloneable command side of an announcer, usable without holding its handle.
#[derive(Debug, Clone)]
pub(crate) struct AnnouncerCommands {
    info_hash: InfoHash,
    sender: mpsc::Sender<AnnouncerCommand>,
}

impl AnnouncerCommands {
    pub(crate) const fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    pub(crate) async fn send(&self, command: AnnouncerCommand) -> AnnouncerResult<()> {
        self.sender
            .send(command)
            .await
            .map_err(|_| AnnouncerError::CommandChannelClosed {
                info_hash: self.info_hash,
            })
    }

    /// Deliver without waiting; `Ok(false)` when the buffer is full.
    pub(crate) fn try_send(&self, command: AnnouncerCommand) -> AnnouncerResult<bool> {
        match self.sender.try_send(command) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(_)) => Ok(false),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(AnnouncerError::CommandChannelClosed {
                info_hash: self.info_hash,
            }),
        }
    }
}

/// Supervisor-side handle to a running announcer task.
#[derive(Debug)]
pub struct AnnouncerHandle {
    torrent: Arc<TorrentIdentity>,
    commands: AnnouncerCommands,
    snapshot: watch::Receiver<AnnouncerSnapshot>,
    task: JoinHandle<AnnouncerSnapshot>,
}

impl AnnouncerHandle {
    /// Torrent served by the task.
    #[must_use]
    pub fn torrent(&self) -> &Arc<TorrentIdentity> {
        &self.torrent
    }

    /// Infohash of the torrent served by the task.
    #[must_use]
    pub fn info_hash(&self) -> InfoHash {
        self.torrent.info_hash
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> AnnouncerSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every snapshot change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AnnouncerSnapshot> {
        self.snapshot.clone()
    }

    /// Whether the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Ask the task to stop.
    ///
    /// # Errors
    ///
    /// Returns [`AnnouncerError::CommandChannelClosed`] when the task already exited.
    pub async fn stop(&self, reason: StopReason) -> AnnouncerResult<()> {
        self.send(AnnouncerCommand::Stop { reason }).await
    }

    /// Ask the task to draw a new speed.
    ///
    /// # Errors
    ///
    /// Returns [`AnnouncerError::CommandChannelClosed`] when the task already exited.
    pub async fn refresh_speed(&self) -> AnnouncerResult<()> {
        self.send(AnnouncerCommand::RefreshSpeed).await
    }

    /// Ask the task to announce immediately.
    ///
    /// # Errors
    ///
    /// Returns [`AnnouncerError::CommandChannelClosed`] when the task already exited.
    pub async fn reannounce(&self) -> AnnouncerResult<()> {
        self.send(AnnouncerCommand::Reannounce).await
    }

    async fn send(&self, command: AnnouncerCommand) -> AnnouncerResult<()> {
        self.commands.send(command).await
    }

    pub(crate) fn commands(&self) -> AnnouncerCommands {
        self.commands.clone()
    }

    /// Wait for the task to exit.
    ///
    /// # Errors
    ///
    /// Returns [`AnnouncerError::TaskFailed`] when the task panicked or was cancelled.
    pub async fn join(self) -> AnnouncerResult<AnnouncerSnapshot> {
        let info_hash = self.info_hash();
        self.task
            .await
            .map_err(|source| AnnouncerError::TaskFailed { info_hash, source })
    }

    /// Wait for the task to exit until `deadline`, aborting it afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`AnnouncerError::Aborted`] when the deadline passed, or
    /// [`AnnouncerError::TaskFailed`] when the task panicked.
    pub async fn join_until(mut self, deadline: Instant) -> AnnouncerResult<AnnouncerSnapshot> {
        let info_hash = self.info_hash();
        match timeout_at(deadline, &mut self.task).await {
            Ok(joined) => joined.map_err(|source| AnnouncerError::TaskFailed { info_hash, source }),
            Err(_) => {
                self.task.abort();
                warn!(%info_hash, "announcer overran grace period; aborted");
                Err(AnnouncerError::Aborted { info_hash })
            }
        }
    }
}
