//! Builds announcers wired to the shared collaborators.

use std::sync::Arc;

use seedcast_config::ConfigProvider;
use seedcast_core::{
    AnnounceDataAccessor, PeerId, ResumeStats, SimulatedStats, TorrentIdentity, Transport,
};
use seedcast_events::EventBus;
use seedcast_telemetry::Metrics;

use crate::announcer::{Announcer, AnnouncerDeps};
use crate::error::{AnnouncerError, AnnouncerResult};
use crate::speed::SpeedProvider;

/// Constructs one [`Announcer`] per torrent.
#[derive(Clone)]
pub struct AnnouncerFactory {
    deps: AnnouncerDeps,
    peer_id: PeerId,
}

impl AnnouncerFactory {
    /// Wire the factory to its shared collaborators and the process peer id.
    #[must_use]
    pub fn new(
        accessor: Arc<dyn AnnounceDataAccessor>,
        transport: Arc<dyn Transport>,
        config: ConfigProvider,
        events: EventBus,
        metrics: Metrics,
        peer_id: PeerId,
    ) -> Self {
        Self {
            deps: AnnouncerDeps {
                accessor,
                transport,
                config,
                events,
                metrics,
            },
            peer_id,
        }
    }

    /// Peer id presented by every announcer from this factory.
    #[must_use]
    pub const fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Live configuration the factory reads from.
    #[must_use]
    pub const fn config(&self) -> &ConfigProvider {
        &self.deps.config
    }

    /// Build an announcer starting from zero counters.
    ///
    /// # Errors
    ///
    /// Returns [`AnnouncerError::Config`] when the live rate bounds are invalid.
    pub fn create(&self, torrent: Arc<TorrentIdentity>) -> AnnouncerResult<Announcer> {
        self.create_with_stats(torrent, ResumeStats::default())
    }

    /// Build an announcer resuming from earlier counters.
    ///
    /// The ratio target and advertised port are read from the live configuration
    /// now and kept for the announcer's lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`AnnouncerError::Config`] when the live rate bounds are invalid.
    pub fn create_with_stats(
        &self,
        torrent: Arc<TorrentIdentity>,
        resume: ResumeStats,
    ) -> AnnouncerResult<Announcer> {
        let snapshot = self.deps.config.current();
        let speed = SpeedProvider::new(self.deps.config.clone())
            .map_err(AnnouncerError::config("factory.create"))?;
        let stats = SimulatedStats::initial(&torrent, resume, self.peer_id, snapshot.client.port);
        Ok(Announcer::new(
            torrent,
            stats,
            snapshot.ratio_target(),
            speed,
            self.deps.clone(),
        ))
    }
}
