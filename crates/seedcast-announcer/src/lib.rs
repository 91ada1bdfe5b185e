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

//! Announce engine: simulated speed, per-torrent state machines, and their supervisor.
//!
//! # Design
//! - `AnnouncerFactory` wires each announcer to the shared accessor, transport,
//!   configuration, event bus, and metrics.
//! - Every `Announcer` runs in its own task and owns its counters and `SpeedProvider`.
//! - `AnnouncerSupervisor` talks to tasks only through command channels and
//!   reads them only through watch snapshots.

pub mod announcer;
pub mod command;
pub mod error;
pub mod factory;
pub mod retry;
pub mod speed;
pub mod state;
pub mod supervisor;

pub use announcer::{Announcer, AnnouncerDeps, AnnouncerHandle};
pub use command::AnnouncerCommand;
pub use error::{AnnouncerError, AnnouncerResult};
pub use factory::AnnouncerFactory;
pub use retry::RetryPolicy;
pub use speed::SpeedProvider;
pub use state::{AnnouncerSnapshot, AnnouncerState};
pub use supervisor::AnnouncerSupervisor;
