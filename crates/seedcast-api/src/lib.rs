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

//! Admin surface: a small read-mostly HTTP API over the announcer supervisor.
//!
//! # Design
//! - `/` redirects to `/ui/`; everything under `/ui` is served without
//!   authentication.
//! - Any other path answers `403 Forbidden`.
//! - Handlers only read watch snapshots and metrics; the single write is a
//!   reannounce request forwarded through the supervisor.
//! - `/ui/events/stream` pushes domain events as server-sent events, replaying
//!   from `Last-Event-ID` when the client reconnects.

mod error;
mod handlers;
pub mod router;
mod sse;
pub mod state;

pub use router::AdminServer;
pub use state::AdminState;
