//! # Design
//!
//! - Centralize application-level errors for bootstrap and background tasks.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: seedcast_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: seedcast_telemetry::TelemetryError,
    },
    /// Tracker client or metainfo operations failed.
    #[error("tracker operation failed")]
    Tracker {
        /// Operation identifier.
        operation: &'static str,
        /// Source tracker error.
        source: seedcast_tracker::TrackerError,
    },
    /// Admin server operations failed.
    #[error("admin server operation failed")]
    AdminServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source server error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Optional path involved in the failure.
        path: Option<PathBuf>,
        /// Source IO error.
        source: io::Error,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: seedcast_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: seedcast_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn tracker(
        operation: &'static str,
        source: seedcast_tracker::TrackerError,
    ) -> Self {
        Self::Tracker { operation, source }
    }

    pub(crate) fn admin_server(operation: &'static str, source: anyhow::Error) -> Self {
        Self::AdminServer {
            operation,
            source: source.into(),
        }
    }

    pub(crate) const fn io(
        operation: &'static str,
        path: Option<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self::Io {
            operation,
            path,
            source,
        }
    }
}
