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

//! File-backed configuration with a live, atomically swapped snapshot.
//!
//! Layout: `model.rs` (typed sections), `defaults.rs` (default values),
//! `validate.rs` (cross-field checks), `provider.rs` (`ConfigProvider`),
//! `loader.rs` (JSON loading + `ConfigWatcher`).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod provider;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigWatcher, load_config, parse_config};
pub use model::{
    AdminConfig, AnnounceConfig, AppConfig, ClientConfig, PathsConfig, RateBounds, RateConfig,
    TelemetryConfig,
};
pub use provider::ConfigProvider;
pub use validate::validate_config;
