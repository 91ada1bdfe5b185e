//! Torrent directory scanning.
//!
//! Every `.torrent` file in the directory gets an announcer; deleting the file
//! removes it. Files that fail to load are remembered with their modification
//! time and retried only after they change.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use seedcast_announcer::AnnouncerSupervisor;
use seedcast_core::InfoHash;
use seedcast_tracker::load_torrent_file;
use tokio::fs;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

const TORRENT_EXTENSION: &str = "torrent";

/// Outcome of one directory pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Torrents newly handed to the supervisor.
    pub added: usize,
    /// Torrents removed because their file disappeared.
    pub removed: usize,
    /// Files that could not be loaded or duplicated a registered torrent.
    pub rejected: usize,
}

/// Mirrors a directory of `.torrent` files into the supervisor.
#[derive(Debug)]
pub struct TorrentDirectory {
    root: PathBuf,
    known: HashMap<PathBuf, InfoHash>,
    rejected: HashMap<PathBuf, Option<SystemTime>>,
}

impl TorrentDirectory {
    /// Directory rooted at `root`; nothing is read until [`Self::sync`].
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            known: HashMap::new(),
            rejected: HashMap::new(),
        }
    }

    /// Directory being mirrored.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory when it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] when the directory cannot be created.
    pub async fn ensure_exists(&self) -> AppResult<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| AppError::io("torrent_dir.create", Some(self.root.clone()), source))
    }

    async fn list(&self) -> AppResult<Vec<(PathBuf, Option<SystemTime>)>> {
        let read_error =
            |source| AppError::io("torrent_dir.read", Some(self.root.clone()), source);
        let mut entries = fs::read_dir(&self.root).await.map_err(read_error)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_error)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(TORRENT_EXTENSION) {
                continue;
            }
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if metadata.is_file() {
                files.push((path, metadata.modified().ok()));
            }
        }
        files.sort_by(|left, right| left.0.cmp(&right.0));
        Ok(files)
    }

    /// Reconcile the supervisor with the directory contents.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] when the directory cannot be listed. Problems with
    /// individual files are logged and counted as rejected.
    pub async fn sync(&mut self, supervisor: &AnnouncerSupervisor) -> AppResult<SyncReport> {
        let files = self.list().await?;
        let mut report = SyncReport::default();

        let present: HashSet<&Path> = files.iter().map(|(path, _)| path.as_path()).collect();
        self.rejected.retain(|path, _| present.contains(path.as_path()));
        let gone: Vec<PathBuf> = self
            .known
            .keys()
            .filter(|path| !present.contains(path.as_path()))
            .cloned()
            .collect();

        for path in gone {
            let Some(info_hash) = self.known.remove(&path) else {
                continue;
            };
            match supervisor.remove_torrent(&info_hash).await {
                Ok(_) => {
                    info!(path = %path.display(), %info_hash, "torrent file removed");
                    report.removed += 1;
                }
                Err(err) => warn!(%info_hash, error = %err, "torrent removal did not finish cleanly"),
            }
        }

        for (path, modified) in files {
            if self.known.contains_key(&path) || self.rejected.get(&path) == Some(&modified) {
                continue;
            }
            let torrent = match load_torrent_file(&path).await {
                Ok(torrent) => torrent,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "torrent file rejected");
                    self.rejected.insert(path, modified);
                    report.rejected += 1;
                    continue;
                }
            };
            let info_hash = torrent.info_hash;
            match supervisor.add_torrent(torrent).await {
                Ok(true) => {
                    info!(path = %path.display(), %info_hash, "torrent file added");
                    self.rejected.remove(&path);
                    self.known.insert(path, info_hash);
                    report.added += 1;
                }
                Ok(false) => {
                    warn!(path = %path.display(), %info_hash, "torrent already registered");
                    self.rejected.insert(path, modified);
                    report.rejected += 1;
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "announcer could not be created");
                    self.rejected.insert(path, modified);
                    report.rejected += 1;
                }
            }
        }

        Ok(report)
    }
}
