//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes only the counters/gauges the announce engine and admin surface need.

use std::fmt;
use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Result label attached to announce counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceOutcome {
    /// The tracker accepted the announce.
    Success,
    /// The announce failed and will be retried (or was the final one).
    Failure,
}

impl AnnounceOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

impl fmt::Debug for Metrics {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("Metrics").finish_non_exhaustive()
    }
}

struct MetricsInner {
    registry: Registry,
    announces_total: IntCounterVec,
    config_reloads_total: IntCounterVec,
    active_announcers: IntGauge,
    simulated_uploaded_bytes_total: IntCounter,
}

/// Snapshot of selected gauges and counters for the admin overview.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Announcer tasks currently running.
    pub active_announcers: i64,
    /// Bytes credited as uploaded across all torrents since start.
    pub simulated_uploaded_bytes_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let announces_total = IntCounterVec::new(
            Opts::new("announces_total", "Tracker announces by event and outcome"),
            &["event", "outcome"],
        )
        .map_err(collector("announces_total"))?;
        let config_reloads_total = IntCounterVec::new(
            Opts::new("config_reloads_total", "Configuration reloads by result"),
            &["result"],
        )
        .map_err(collector("config_reloads_total"))?;
        let active_announcers = IntGauge::with_opts(Opts::new(
            "active_announcers",
            "Announcer tasks currently running",
        ))
        .map_err(collector("active_announcers"))?;
        let simulated_uploaded_bytes_total = IntCounter::with_opts(Opts::new(
            "simulated_uploaded_bytes_total",
            "Bytes credited as uploaded by successful announces",
        ))
        .map_err(collector("simulated_uploaded_bytes_total"))?;

        register(&registry, "announces_total", announces_total.clone())?;
        register(&registry, "config_reloads_total", config_reloads_total.clone())?;
        register(&registry, "active_announcers", active_announcers.clone())?;
        register(
            &registry,
            "simulated_uploaded_bytes_total",
            simulated_uploaded_bytes_total.clone(),
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                announces_total,
                config_reloads_total,
                active_announcers,
                simulated_uploaded_bytes_total,
            }),
        })
    }

    /// Count an announce attempt.
    pub fn record_announce(&self, event: &str, outcome: AnnounceOutcome) {
        self.inner
            .announces_total
            .with_label_values(&[event, outcome.as_str()])
            .inc();
    }

    /// Count a configuration reload attempt.
    pub fn record_config_reload(&self, accepted: bool) {
        let result = if accepted { "accepted" } else { "rejected" };
        self.inner
            .config_reloads_total
            .with_label_values(&[result])
            .inc();
    }

    /// Add newly credited upload bytes.
    pub fn add_uploaded_bytes(&self, bytes: u64) {
        self.inner.simulated_uploaded_bytes_total.inc_by(bytes);
    }

    /// Mark an announcer task as started.
    pub fn announcer_started(&self) {
        self.inner.active_announcers.inc();
    }

    /// Mark an announcer task as finished.
    pub fn announcer_finished(&self) {
        self.inner.active_announcers.dec();
    }

    /// Number of announces recorded for a label pair.
    #[must_use]
    pub fn announce_count(&self, event: &str, outcome: AnnounceOutcome) -> u64 {
        self.inner
            .announces_total
            .with_label_values(&[event, outcome.as_str()])
            .get()
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_announcers: self.inner.active_announcers.get(),
            simulated_uploaded_bytes_total: self.inner.simulated_uploaded_bytes_total.get(),
        }
    }
}

fn collector(name: &'static str) -> impl FnOnce(prometheus::Error) -> TelemetryError {
    move |source| TelemetryError::MetricsCollector { name, source }
}

fn register<C>(registry: &Registry, name: &'static str, collector: C) -> Result<()>
where
    C: prometheus::core::Collector + 'static,
{
    registry
        .register(Box::new(collector))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}
