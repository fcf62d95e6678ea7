use std::sync::LazyLock;

use regex::Regex;

static SCENE_TRACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[_\-.])scene_(\d+)_track_(\d+)(?:[_\-.]|$)").expect("valid regex")
});

/// `scene_<n>_track_<m>` key of a frame file name, with leading zeros dropped.
///
/// `scene_02_track_5_frame_001.jpg` yields `scene_2_track_5`.
pub fn scene_track_key(file_name: &str) -> Option<String> {
    let caps = SCENE_TRACK.captures(file_name)?;
    let scene: u64 = caps[1].parse().ok()?;
    let track: u64 = caps[2].parse().ok()?;
    Some(format!("scene_{scene}_track_{track}"))
}
