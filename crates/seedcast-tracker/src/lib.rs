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

//! HTTP tracker protocol: announce query building, bencoded reply decoding,
//! the `reqwest` transport, and `.torrent` metainfo loading.
//!
//! # Design
//! - `BencodeAnnounceAccessor` and `HttpTransport` implement the engine's
//!   collaborator traits from `seedcast-core`; neither holds per-torrent state.
//! - One `reqwest::Client` is shared by every announcer so connections are pooled.
//! - Metainfo is decoded with `serde_bencode`; the infohash is taken over the
//!   re-encoded `info` dictionary.

pub mod accessor;
pub mod error;
pub mod http;
pub mod metainfo;

pub use accessor::{
    BencodeAnnounceAccessor, MAX_TRACKER_INTERVAL_SECS, MIN_TRACKER_INTERVAL_SECS,
};
pub use error::{TrackerError, TrackerResult};
pub use http::HttpTransport;
pub use metainfo::{load_torrent_file, parse_metainfo};
