pub mod annotation_status;
pub mod folder_name;
pub mod storage;

pub use annotation_status::{ClusterStatus, EpisodeStatus, ImageStatus};
pub use folder_name::{FolderInfo, parse_folder_name, sanitize_folder_name};
