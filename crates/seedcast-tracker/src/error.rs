//! Error types for tracker setup and metainfo loading.
//!
//! Announce-time failures are reported as `seedcast_core::AnnounceError`; this
//! module covers everything that happens before an announcer exists.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building the HTTP client or loading torrents.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The HTTP client could not be constructed.
    #[error("failed to build tracker http client")]
    HttpClient {
        /// Source reqwest error.
        source: reqwest::Error,
    },
    /// A bencoded document could not be decoded or re-encoded.
    #[error("bencode operation failed")]
    Bencode {
        /// Operation identifier.
        operation: &'static str,
        /// Source bencode error.
        source: serde_bencode::Error,
    },
    /// The metainfo decoded but is unusable.
    #[error("invalid torrent metainfo")]
    InvalidMetainfo {
        /// Offending field.
        field: &'static str,
        /// Machine-readable reason.
        reason: &'static str,
    },
    /// Reading a torrent file failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the operation.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
}

impl TrackerError {
    pub(crate) fn bencode(operation: &'static str) -> impl FnOnce(serde_bencode::Error) -> Self {
        move |source| Self::Bencode { operation, source }
    }
}

/// Convenience alias for tracker results.
pub type TrackerResult<T> = Result<T, TrackerError>;
