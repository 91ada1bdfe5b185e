//! `.torrent` metainfo decoding.

use std::path::Path;

use seedcast_core::{InfoHash, TorrentIdentity};
use serde::Deserialize;
use serde_bencode::value::Value;
use sha1::{Digest, Sha1};
use tracing::instrument;

use crate::error::{TrackerError, TrackerResult};

#[derive(Debug, Deserialize)]
struct RawMetainfo {
    #[serde(default)]
    announce: Option<String>,
    #[serde(rename = "announce-list", default)]
    announce_list: Vec<Vec<String>>,
    info: Value,
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    name: String,
    #[serde(rename = "piece length")]
    piece_length: u64,
    #[serde(default)]
    length: Option<u64>,
    #[serde(default)]
    files: Vec<RawFile>,
}

#[derive(Debug, Deserialize)]
struct RawFile {
    length: u64,
}

fn is_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Decode a metainfo document into the identity an announcer needs.
///
/// The announce URL is `announce` when it is HTTP(S), otherwise the first
/// HTTP(S) entry of `announce-list`.
///
/// # Errors
///
/// Returns [`TrackerError::Bencode`] for malformed documents and
/// [`TrackerError::InvalidMetainfo`] when no HTTP tracker or usable size is present.
pub fn parse_metainfo(bytes: &[u8]) -> TrackerResult<TorrentIdentity> {
    let raw: RawMetainfo =
        serde_bencode::from_bytes(bytes).map_err(TrackerError::bencode("metainfo.decode"))?;
    let info_bytes =
        serde_bencode::to_bytes(&raw.info).map_err(TrackerError::bencode("metainfo.info_encode"))?;
    let info: RawInfo = serde_bencode::from_bytes(&info_bytes)
        .map_err(TrackerError::bencode("metainfo.info_decode"))?;

    let total_size = match info.length {
        Some(length) => length,
        None if !info.files.is_empty() => info
            .files
            .iter()
            .try_fold(0_u64, |total, file| total.checked_add(file.length))
            .ok_or(TrackerError::InvalidMetainfo {
                field: "info.files",
                reason: "total length overflows",
            })?,
        None => {
            return Err(TrackerError::InvalidMetainfo {
                field: "info.length",
                reason: "neither length nor files present",
            });
        }
    };

    let announce_url = raw
        .announce
        .into_iter()
        .chain(raw.announce_list.into_iter().flatten())
        .find(|url| is_http(url))
        .ok_or(TrackerError::InvalidMetainfo {
            field: "announce",
            reason: "no http tracker",
        })?;

    let digest: [u8; 20] = Sha1::digest(&info_bytes).into();
    Ok(TorrentIdentity {
        info_hash: InfoHash::new(digest),
        name: info.name,
        piece_size: info.piece_length,
        total_size,
        announce_url,
    })
}

/// Read and decode a `.torrent` file.
///
/// # Errors
///
/// Returns [`TrackerError::Io`] when the file cannot be read, otherwise the
/// errors of [`parse_metainfo`].
#[instrument(name = "metainfo.load", skip_all, fields(path = %path.display()))]
pub async fn load_torrent_file(path: &Path) -> TrackerResult<TorrentIdentity> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| TrackerError::Io {
            operation: "metainfo.read",
            path: path.to_path_buf(),
            source,
        })?;
    parse_metainfo(&bytes)
}
