#![forbid(unsafe_code)]
#![warn(
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Announce-domain types and collaborator interfaces shared across the workspace.
//!
//! Layout: `model.rs` (torrent identity, simulated counters, announce events and
//! results), `service.rs` (request builder/decoder and transport traits),
//! `error.rs` (announce failure taxonomy).

pub mod error;
pub mod model;
pub mod service;

pub use error::{AnnounceError, TransportErrorKind};
pub use model::{
    AnnounceEvent, AnnounceResult, InfoHash, PeerId, RatioTarget, ResumeStats, SimulatedStats,
    StopReason, TorrentIdentity,
};
pub use service::{AnnounceDataAccessor, AnnounceRequest, Transport};
