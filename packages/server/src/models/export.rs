use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

/// Canonical labeled dataset for one episode.
#[derive(Debug, Serialize, ToSchema)]
pub struct ExportDocument {
    pub metadata: ExportMetadata,
    /// Keyed by cluster folder name.
    pub cluster_annotations: BTreeMap<String, ClusterExport>,
    /// Keyed by scene/track pattern.
    pub split_annotations: BTreeMap<String, SplitExport>,
    pub statistics: ExportStatistics,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExportMetadata {
    #[schema(example = "friends_s01e05")]
    pub episode_id: String,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    #[schema(example = "friends_s01e05_clusters.json")]
    pub clustering_file: String,
    pub model_name: String,
    /// RFC 3339 timestamp of the latest annotation.
    pub annotation_date: String,
    pub annotator_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClusterExport {
    /// Lowercased majority label.
    #[schema(example = "rachel")]
    pub label: String,
    /// True if any image in the majority group carries a custom label.
    pub is_custom_label: bool,
    pub confidence: Confidence,
    pub image_count: usize,
    pub image_paths: Vec<String>,
    pub outliers: Vec<OutlierExport>,
    pub split_annotations: Vec<SplitExport>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OutlierExport {
    pub image_path: String,
    pub label: String,
    pub is_custom_label: bool,
    pub quality: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SplitExport {
    pub scene_track_pattern: String,
    pub label: String,
    pub image_count: usize,
    pub image_paths: Vec<String>,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct ExportStatistics {
    /// All clusters of the episode, annotated or not.
    pub total_clusters: usize,
    /// Clusters present in `cluster_annotations`.
    pub annotated_clusters: usize,
    pub total_faces: u64,
    pub outliers_found: u64,
    pub not_human_clusters: usize,
    pub character_distribution: BTreeMap<String, u64>,
}
