//! Error types for announcer orchestration.

use seedcast_config::ConfigError;
use seedcast_core::InfoHash;
use thiserror::Error;
use tokio::task::JoinError;

/// Failures surfaced by the factory, handles, and supervisor.
#[derive(Debug, Error)]
pub enum AnnouncerError {
    /// Configuration was rejected or could not produce an announcer.
    #[error("announcer configuration invalid")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: ConfigError,
    },
    /// The announcer task is no longer accepting commands.
    #[error("announcer task is not running")]
    CommandChannelClosed {
        /// Torrent the command targeted.
        info_hash: InfoHash,
    },
    /// The announcer task panicked or was cancelled.
    #[error("announcer task failed")]
    TaskFailed {
        /// Torrent the task served.
        info_hash: InfoHash,
        /// Source join error.
        source: JoinError,
    },
    /// The announcer task overran its grace period and was aborted.
    #[error("announcer task aborted after grace period")]
    Aborted {
        /// Torrent the task served.
        info_hash: InfoHash,
    },
}

impl AnnouncerError {
    pub(crate) fn config(operation: &'static str) -> impl FnOnce(ConfigError) -> Self {
        move |source| Self::Config { operation, source }
    }
}

/// Convenience alias for announcer results.
pub type AnnouncerResult<T> = Result<T, AnnouncerError>;
