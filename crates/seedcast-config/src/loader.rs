//! JSON document loading and change polling.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::fs;
use tokio::time::sleep;
use tracing::{debug, instrument};

use crate::error::{ConfigError, ConfigResult};
use crate::model::AppConfig;
use crate::validate::validate_config;

/// Decode and validate a configuration document.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed JSON and
/// [`ConfigError::InvalidField`] for documents that fail validation.
pub fn parse_config(document: &str) -> ConfigResult<AppConfig> {
    let config: AppConfig =
        serde_json::from_str(document).map_err(|source| ConfigError::Parse {
            operation: "config.parse",
            source,
        })?;
    validate_config(&config)?;
    Ok(config)
}

/// Read, decode, and validate the configuration file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read, otherwise the
/// errors of [`parse_config`].
#[instrument(name = "config.load", skip_all, fields(path = %path.display()))]
pub async fn load_config(path: &Path) -> ConfigResult<AppConfig> {
    let document = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            operation: "config.read",
            path: path.to_path_buf(),
            source,
        })?;
    parse_config(&document)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

async fn stamp(path: &Path) -> ConfigResult<FileStamp> {
    let metadata = fs::metadata(path)
        .await
        .map_err(|source| ConfigError::Io {
            operation: "config.metadata",
            path: path.to_path_buf(),
            source,
        })?;
    Ok(FileStamp {
        modified: metadata.modified().ok(),
        len: metadata.len(),
    })
}

/// Polls a configuration file and yields a freshly loaded snapshot whenever it changes.
#[derive(Debug)]
pub struct ConfigWatcher {
    path: PathBuf,
    poll_interval: Duration,
    last_stamp: Option<FileStamp>,
}

impl ConfigWatcher {
    /// Load the file once and return the snapshot with a watcher primed on it.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`load_config`].
    pub async fn watch(
        path: impl Into<PathBuf>,
        poll_interval: Duration,
    ) -> ConfigResult<(AppConfig, Self)> {
        let path = path.into();
        let last_stamp = stamp(&path).await.ok();
        let config = load_config(&path).await?;
        let watcher = Self {
            path,
            poll_interval,
            last_stamp,
        };
        Ok((config, watcher))
    }

    /// Path being watched.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Await the next changed snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error when the file disappears or the changed document is invalid.
    /// The watcher stays usable; a later fix to the file is picked up by the next call.
    pub async fn next(&mut self) -> ConfigResult<AppConfig> {
        loop {
            sleep(self.poll_interval).await;
            let current = stamp(&self.path).await?;
            if self.last_stamp == Some(current) {
                continue;
            }
            debug!(path = %self.path.display(), "configuration file changed");
            self.last_stamp = Some(current);
            return load_config(&self.path).await;
        }
    }
}
