//! Error types for announce operations.

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

/// Transport failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection could not be established or was reset.
    Connect,
    /// The request exceeded its deadline.
    Timeout,
    /// The tracker answered with a non-success HTTP status.
    Status {
        /// HTTP status code.
        code: u16,
    },
    /// The reply body could not be read.
    Body,
}

impl Display for TransportErrorKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => formatter.write_str("connect"),
            Self::Timeout => formatter.write_str("timeout"),
            Self::Status { code } => write!(formatter, "status {code}"),
            Self::Body => formatter.write_str("body"),
        }
    }
}

/// Failure of a single announce attempt. Every variant is retryable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnnounceError {
    /// The request never produced a usable reply.
    #[error("announce transport failed")]
    Transport {
        /// Failure classification.
        kind: TransportErrorKind,
        /// Human readable detail from the transport.
        detail: String,
    },
    /// The reply could not be decoded.
    #[error("announce reply could not be decoded")]
    ProtocolDecode {
        /// Decoder detail.
        detail: String,
    },
    /// The tracker rejected the announce with an explicit reason.
    #[error("tracker rejected announce")]
    TrackerFailure {
        /// Reason supplied by the tracker.
        reason: String,
    },
    /// The request could not be built from the torrent's announce URL.
    #[error("announce request could not be built")]
    InvalidRequest {
        /// Builder detail.
        detail: String,
    },
}

impl AnnounceError {
    /// Shorthand for a transport failure.
    #[must_use]
    pub fn transport(kind: TransportErrorKind, detail: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            detail: detail.into(),
        }
    }

    /// Shorthand for a decode failure.
    #[must_use]
    pub fn decode(detail: impl Into<String>) -> Self {
        Self::ProtocolDecode {
            detail: detail.into(),
        }
    }

    /// Stable label used for metrics and event payloads.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Transport {
                kind: TransportErrorKind::Timeout,
                ..
            } => "timeout",
            Self::Transport { .. } => "transport",
            Self::ProtocolDecode { .. } => "decode",
            Self::TrackerFailure { .. } => "tracker_failure",
            Self::InvalidRequest { .. } => "invalid_request",
        }
    }

    /// Detail text carried by the variant.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Transport { kind, detail } => format!("{kind}: {detail}"),
            Self::ProtocolDecode { detail } | Self::InvalidRequest { detail } => detail.clone(),
            Self::TrackerFailure { reason } => reason.clone(),
        }
    }
}
