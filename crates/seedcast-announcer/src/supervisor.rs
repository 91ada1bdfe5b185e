//! Owns the set of announcers and fans configuration changes out to them.

use std::collections::HashMap;
use std::sync::Arc;

use seedcast_config::{AppConfig, ConfigProvider};
use seedcast_core::{InfoHash, ResumeStats, StopReason, TorrentIdentity};
use seedcast_events::{Event, EventBus};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::announcer::{AnnouncerCommands, AnnouncerHandle, deadline_after};
use crate::command::AnnouncerCommand;
use crate::error::{AnnouncerError, AnnouncerResult};
use crate::factory::AnnouncerFactory;
use crate::state::AnnouncerSnapshot;

/// Starts, tracks, and stops one announcer per torrent.
///
/// Finished announcers (ratio reached) stay registered so a torrent is not
/// picked up again until it is explicitly removed.
pub struct AnnouncerSupervisor {
    factory: AnnouncerFactory,
    events: EventBus,
    announcers: Mutex<HashMap<InfoHash, AnnouncerHandle>>,
}

impl AnnouncerSupervisor {
    /// Supervisor creating announcers through `factory`.
    #[must_use]
    pub fn new(factory: AnnouncerFactory, events: EventBus) -> Self {
        Self {
            factory,
            events,
            announcers: Mutex::new(HashMap::new()),
        }
    }

    fn config(&self) -> &ConfigProvider {
        self.factory.config()
    }

    /// Start announcing a torrent from zero counters.
    ///
    /// Returns `false` when the torrent is already registered.
    ///
    /// # Errors
    ///
    /// Returns [`AnnouncerError::Config`] when the announcer cannot be built.
    pub async fn add_torrent(&self, torrent: TorrentIdentity) -> AnnouncerResult<bool> {
        self.add_torrent_with_stats(torrent, ResumeStats::default())
            .await
    }

    /// Start announcing a torrent resuming from earlier counters.
    ///
    /// # Errors
    ///
    /// Returns [`AnnouncerError::Config`] when the announcer cannot be built.
    pub async fn add_torrent_with_stats(
        &self,
        torrent: TorrentIdentity,
        resume: ResumeStats,
    ) -> AnnouncerResult<bool> {
        let mut announcers = self.announcers.lock().await;
        if announcers.contains_key(&torrent.info_hash) {
            return Ok(false);
        }
        let info_hash = torrent.info_hash;
        let announcer = self
            .factory
            .create_with_stats(Arc::new(torrent), resume)?;
        announcers.insert(info_hash, announcer.start());
        drop(announcers);
        info!(%info_hash, "torrent registered");
        Ok(true)
    }

    /// Stop and forget a torrent, waiting up to the shutdown grace period.
    ///
    /// Returns `None` when the torrent was not registered.
    ///
    /// # Errors
    ///
    /// Returns [`AnnouncerError::Aborted`] when the task overran the grace period.
    pub async fn remove_torrent(
        &self,
        info_hash: &InfoHash,
    ) -> AnnouncerResult<Option<AnnouncerSnapshot>> {
        let Some(handle) = self.announcers.lock().await.remove(info_hash) else {
            return Ok(None);
        };
        let deadline = deadline_after(self.config().current().announce.shutdown_grace());
        if handle.stop(StopReason::Removed).await.is_err() {
            info!(%info_hash, "removed torrent had already finished");
        }
        handle.join_until(deadline).await.map(Some)
    }

    /// Validate and apply a new configuration, then redraw every running announcer's speed.
    ///
    /// The ratio target of existing announcers is not changed.
    ///
    /// # Errors
    ///
    /// Returns [`AnnouncerError::Config`] and keeps the previous snapshot when
    /// `config` is invalid.
    pub async fn refresh_config(&self, config: AppConfig) -> AnnouncerResult<u64> {
        let revision = self
            .config()
            .replace(config)
            .map_err(AnnouncerError::config("supervisor.refresh_config"))?;
        self.events.publish(Event::SettingsChanged { revision });
        self.refresh_speeds().await;
        Ok(revision)
    }

    /// Ask every running announcer to redraw its speed.
    ///
    /// Announcers whose command buffer is full are skipped; they redraw on
    /// their own timer.
    pub async fn refresh_speeds(&self) {
        let running: Vec<AnnouncerCommands> = self
            .announcers
            .lock()
            .await
            .values()
            .filter(|handle| !handle.is_finished())
            .map(AnnouncerHandle::commands)
            .collect();
        for commands in running {
            match commands.try_send(AnnouncerCommand::RefreshSpeed) {
                Ok(true) => {}
                Ok(false) => {
                    warn!(info_hash = %commands.info_hash(), "command buffer full; speed refresh skipped");
                }
                Err(err) => {
                    warn!(info_hash = %commands.info_hash(), error = %err, "speed refresh not delivered");
                }
            }
        }
    }

    /// Ask a torrent's announcer to announce now. Returns `false` when unknown.
    ///
    /// # Errors
    ///
    /// Returns [`AnnouncerError::CommandChannelClosed`] when the announcer has finished.
    pub async fn reannounce(&self, info_hash: &InfoHash) -> AnnouncerResult<bool> {
        let commands = self
            .announcers
            .lock()
            .await
            .get(info_hash)
            .map(AnnouncerHandle::commands);
        match commands {
            Some(commands) => commands
                .send(AnnouncerCommand::Reannounce)
                .await
                .map(|()| true),
            None => Ok(false),
        }
    }

    /// Whether a torrent is registered, running or finished.
    pub async fn contains(&self, info_hash: &InfoHash) -> bool {
        self.announcers.lock().await.contains_key(info_hash)
    }

    /// Registered infohashes.
    pub async fn info_hashes(&self) -> Vec<InfoHash> {
        self.announcers.lock().await.keys().copied().collect()
    }

    /// Snapshot of one torrent's announcer.
    pub async fn snapshot(&self, info_hash: &InfoHash) -> Option<AnnouncerSnapshot> {
        self.announcers
            .lock()
            .await
            .get(info_hash)
            .map(AnnouncerHandle::snapshot)
    }

    /// Snapshots of every registered announcer, ordered by torrent name.
    pub async fn snapshots(&self) -> Vec<AnnouncerSnapshot> {
        let mut snapshots: Vec<AnnouncerSnapshot> = self
            .announcers
            .lock()
            .await
            .values()
            .map(AnnouncerHandle::snapshot)
            .collect();
        snapshots.sort_by(|left, right| left.name.cmp(&right.name));
        snapshots
    }

    /// Number of announcers whose task is still running.
    pub async fn active_count(&self) -> usize {
        self.announcers
            .lock()
            .await
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Stop every announcer, wait up to the shutdown grace period, then abort stragglers.
    pub async fn shutdown(&self) -> Vec<AnnouncerSnapshot> {
        let handles: Vec<AnnouncerHandle> = self
            .announcers
            .lock()
            .await
            .drain()
            .map(|(_, handle)| handle)
            .collect();
        let grace = self.config().current().announce.shutdown_grace();
        info!(count = handles.len(), grace_secs = grace.as_secs(), "stopping announcers");

        for handle in &handles {
            let _ = handle.stop(StopReason::Shutdown).await;
        }

        let deadline = deadline_after(grace);
        let mut finished = Vec::with_capacity(handles.len());
        for handle in handles {
            let info_hash = handle.info_hash();
            match handle.join_until(deadline).await {
                Ok(snapshot) => finished.push(snapshot),
                Err(err) => warn!(%info_hash, error = %err, "announcer did not stop cleanly"),
            }
        }
        finished
    }
}
