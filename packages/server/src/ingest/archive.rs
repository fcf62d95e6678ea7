//! Reading cluster folders out of an uploaded ZIP archive.
//!
//! Only `<cluster folder>/<image file>` entries are used. Top-level files,
//! deeper nesting, hidden entries, and non-image files are ignored.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::Component;

use common::{FolderInfo, parse_folder_name, sanitize_folder_name};
use thiserror::Error;
use tracing::warn;

use crate::utils::filename::{is_hidden_entry, is_image_file};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const EMPTY_ZIP_MAGIC: &[u8] = b"PK\x05\x06";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("File is not a ZIP archive")]
    NotZip,
    #[error("Corrupted ZIP archive: {0}")]
    Corrupt(String),
    #[error("File '{name}' exceeds maximum decompressed size of {limit} bytes")]
    EntryTooLarge { name: String, limit: u64 },
    #[error("Total decompressed archive content exceeds {limit} bytes")]
    TotalTooLarge { limit: u64 },
    #[error("Archive contains no cluster folders with images")]
    NoClusters,
}

#[derive(Debug, Clone, Copy)]
pub struct ArchiveLimits {
    pub max_entry_size: u64,
    pub max_total_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// One cluster folder and its images, sorted by file name.
#[derive(Debug, Clone)]
pub struct ClusterFolder {
    pub name: String,
    pub info: FolderInfo,
    pub images: Vec<ImageFile>,
}

/// Check the content really is a ZIP archive without extracting anything.
pub fn inspect(data: &[u8]) -> Result<(), ArchiveError> {
    if !(data.starts_with(ZIP_MAGIC) || data.starts_with(EMPTY_ZIP_MAGIC)) {
        return Err(ArchiveError::NotZip);
    }
    zip::ZipArchive::new(Cursor::new(data))
        .map(|_| ())
        .map_err(|e| ArchiveError::Corrupt(e.to_string()))
}

/// Decompress every cluster folder, in folder-name order.
pub fn read_clusters(data: &[u8], limits: ArchiveLimits) -> Result<Vec<ClusterFolder>, ArchiveError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|e| ArchiveError::Corrupt(e.to_string()))?;

    let mut folders: BTreeMap<String, BTreeMap<String, Vec<u8>>> = BTreeMap::new();
    let mut total_decompressed: u64 = 0;

    for i in 0..archive.len() {
        let file = archive
            .by_index(i)
            .map_err(|e| ArchiveError::Corrupt(e.to_string()))?;

        // Reject entries with path traversal components (e.g. "../").
        let Some(path) = file.enclosed_name() else {
            continue;
        };
        let parts: Vec<String> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(p) => Some(p.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        let Some(folder) = parts.first() else {
            continue;
        };
        if is_hidden_entry(folder) {
            continue;
        }
        let folder = sanitize_folder_name(folder);
        if folder.is_empty() {
            continue;
        }

        if file.is_dir() {
            if parts.len() == 1 {
                folders.entry(folder).or_default();
            }
            continue;
        }
        // Top-level files are not clusters; nested directories are not scanned.
        if parts.len() != 2 {
            continue;
        }
        let file_name = &parts[1];
        let images = folders.entry(folder.clone()).or_default();
        if is_hidden_entry(file_name) || !is_image_file(file_name) {
            continue;
        }
        if images.contains_key(file_name) {
            warn!(folder = %folder, file = %file_name, "Duplicate archive entry skipped");
            continue;
        }

        let mut buf = Vec::new();
        file.take(limits.max_entry_size + 1)
            .read_to_end(&mut buf)
            .map_err(|e| ArchiveError::Corrupt(format!("Failed to read '{file_name}': {e}")))?;

        if buf.len() as u64 > limits.max_entry_size {
            return Err(ArchiveError::EntryTooLarge {
                name: format!("{folder}/{file_name}"),
                limit: limits.max_entry_size,
            });
        }

        total_decompressed += buf.len() as u64;
        if total_decompressed > limits.max_total_size {
            return Err(ArchiveError::TotalTooLarge {
                limit: limits.max_total_size,
            });
        }

        images.insert(file_name.clone(), buf);
    }

    let clusters: Vec<ClusterFolder> = folders
        .into_iter()
        .filter_map(|(name, images)| {
            if images.is_empty() {
                warn!(folder = %name, "Skipping cluster folder without images");
                return None;
            }
            Some(ClusterFolder {
                info: parse_folder_name(&name),
                images: images
                    .into_iter()
                    .map(|(file_name, data)| ImageFile { file_name, data })
                    .collect(),
                name,
            })
        })
        .collect();

    if clusters.is_empty() {
        return Err(ArchiveError::NoClusters);
    }
    Ok(clusters)
}

/// Season and episode from the first folder, in order, that carries both.
///
/// Folders that disagree with the chosen values are logged, not rejected.
pub fn episode_metadata(clusters: &[ClusterFolder]) -> (Option<i32>, Option<i32>) {
    let chosen = clusters
        .iter()
        .find_map(|c| c.info.season.zip(c.info.episode));

    if let Some((season, episode)) = chosen {
        for c in clusters {
            if let Some(found) = c.info.season.zip(c.info.episode)
                && found != (season, episode)
            {
                warn!(
                    folder = %c.name,
                    expected_season = season,
                    expected_episode = episode,
                    found_season = found.0,
                    found_episode = found.1,
                    "Cluster folder disagrees with episode metadata"
                );
            }
        }
    }

    (chosen.map(|(s, _)| s), chosen.map(|(_, e)| e))
}
