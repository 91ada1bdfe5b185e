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

//! seedcast application bootstrap wiring.
//!
//! Layout: `bootstrap.rs` (service wiring and shutdown), `torrent_dir.rs`
//! (torrent directory scanning), `error.rs` (application errors).

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Application-level error type.
pub mod error;
/// Keeps the supervisor in step with the torrent directory.
pub mod torrent_dir;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};
