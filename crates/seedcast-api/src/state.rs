//! Shared handler state.

use std::sync::Arc;

use seedcast_announcer::AnnouncerSupervisor;
use seedcast_config::ConfigProvider;
use seedcast_events::EventBus;
use seedcast_telemetry::Metrics;

/// Dependencies the admin handlers read from.
#[derive(Clone)]
pub struct AdminState {
    /// Supervisor owning every announcer.
    pub supervisor: Arc<AnnouncerSupervisor>,
    /// Live configuration.
    pub config: ConfigProvider,
    /// Event bus for the recent-events view.
    pub events: EventBus,
    /// Metrics registry rendered at `/ui/metrics`.
    pub metrics: Metrics,
}

impl AdminState {
    /// Bundle the admin dependencies.
    #[must_use]
    pub const fn new(
        supervisor: Arc<AnnouncerSupervisor>,
        config: ConfigProvider,
        events: EventBus,
        metrics: Metrics,
    ) -> Self {
        Self {
            supervisor,
            config,
            events,
            metrics,
        }
    }
}
