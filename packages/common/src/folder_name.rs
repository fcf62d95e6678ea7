//! Parsing of cluster directory names produced by the face-clustering pipeline.
//!
//! Recognised forms, tried in order (case-insensitive):
//!
//! * `friends_s01e01a_cluster-730` (show prefix, optional variant letter)
//! * `S01E05_cluster-23`
//! * `S01E05_Rachel`
//! * `cluster_123`
//!
//! Anything else becomes a bare label.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;

/// Metadata recovered from a cluster folder name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FolderInfo {
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub cluster_number: Option<i32>,
    pub label: String,
}

static SHOW_PREFIXED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z0-9][a-z0-9_]*?_s(\d+)e(\d+)[a-z]?_(cluster[-_](\d+))$").expect("valid regex")
});

static SEASON_EPISODE_CLUSTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^s(\d+)e(\d+)_(cluster[-_](\d+))$").expect("valid regex")
});

static SEASON_EPISODE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^s(\d+)e(\d+)_(.+)$").expect("valid regex"));

static LEGACY_CLUSTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^cluster[-_](\d+)$").expect("valid regex"));

/// Strip characters that could escape the upload tree.
///
/// Removes NUL bytes and path separators, then removes `..` until none remain
/// so that e.g. `....` cannot collapse into a parent reference.
pub fn sanitize_folder_name(raw: &str) -> String {
    let mut name: String = raw
        .chars()
        .filter(|c| !matches!(c, '\0' | '/' | '\\'))
        .collect();
    while name.contains("..") {
        name = name.replace("..", "");
    }
    name.trim().to_string()
}

/// Parse a raw directory name. Never fails; unknown shapes fall back to a label only.
pub fn parse_folder_name(raw: &str) -> FolderInfo {
    let name = sanitize_folder_name(raw);

    SHOW_PREFIXED
        .captures(&name)
        .and_then(|caps| season_episode_cluster(&caps))
        .or_else(|| {
            SEASON_EPISODE_CLUSTER
                .captures(&name)
                .and_then(|caps| season_episode_cluster(&caps))
        })
        .or_else(|| {
            SEASON_EPISODE_NAME.captures(&name).and_then(|caps| {
                Some(FolderInfo {
                    season: Some(number(&caps, 1)?),
                    episode: Some(number(&caps, 2)?),
                    cluster_number: None,
                    label: caps[3].to_string(),
                })
            })
        })
        .or_else(|| {
            LEGACY_CLUSTER.captures(&name).and_then(|caps| {
                Some(FolderInfo {
                    season: None,
                    episode: None,
                    cluster_number: Some(number(&caps, 1)?),
                    label: name.clone(),
                })
            })
        })
        .unwrap_or_else(|| FolderInfo {
            label: name.clone(),
            ..Default::default()
        })
}

fn season_episode_cluster(caps: &Captures<'_>) -> Option<FolderInfo> {
    Some(FolderInfo {
        season: Some(number(caps, 1)?),
        episode: Some(number(caps, 2)?),
        cluster_number: Some(number(caps, 4)?),
        label: caps[3].to_string(),
    })
}

/// Integer capture; `None` on overflow so the next pattern gets a chance.
fn number(caps: &Captures<'_>, group: usize) -> Option<i32> {
    caps.get(group)?.as_str().parse().ok()
}
