use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::ClusterStatus;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::image::ImageResponse;
use crate::entity::cluster;

#[derive(Debug, Serialize, ToSchema)]
pub struct ClusterResponse {
    pub id: Uuid,
    pub episode_id: Uuid,
    #[schema(example = "S01E05_cluster-23")]
    pub cluster_name: String,
    pub cluster_number: Option<i32>,
    pub initial_label: Option<String>,
    pub person_name: Option<String>,
    pub is_single_person: Option<bool>,
    pub annotation_status: ClusterStatus,
    pub outlier_count: i32,
    pub has_outliers: bool,
    pub created_at: DateTime<Utc>,
}

impl From<cluster::Model> for ClusterResponse {
    fn from(m: cluster::Model) -> Self {
        Self {
            id: m.id,
            episode_id: m.episode_id,
            cluster_name: m.cluster_name,
            cluster_number: m.cluster_number,
            initial_label: m.initial_label,
            person_name: m.person_name,
            is_single_person: m.is_single_person,
            annotation_status: m.annotation_status,
            outlier_count: m.outlier_count,
            has_outliers: m.has_outliers,
            created_at: m.created_at,
        }
    }
}

/// One page of images still under review (`pending` or `outlier`).
#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedImagesResponse {
    pub cluster_id: Uuid,
    pub cluster_name: String,
    pub initial_label: Option<String>,
    pub images: Vec<ImageResponse>,
    pub total_count: u64,
    pub page: u64,
    pub page_size: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// All images of a cluster, plus the same images keyed by `scene_<n>_track_<m>`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClusterImagesResponse {
    pub cluster_id: Uuid,
    pub images: Vec<ImageResponse>,
    pub scene_tracks: BTreeMap<String, Vec<ImageResponse>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkOutliersRequest {
    /// Must match the cluster in the path when given.
    pub cluster_id: Option<Uuid>,
    /// The complete outlier selection. Outliers not listed go back to `pending`.
    #[serde(default)]
    pub outlier_image_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchAnnotateRequest {
    #[schema(example = "Rachel")]
    pub person_name: String,
    #[serde(default)]
    pub is_custom_label: bool,
}

/// Single-call annotation kept for older clients.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AnnotateClusterRequest {
    pub is_single_person: bool,
    pub person_name: Option<String>,
    #[serde(default)]
    pub is_custom_label: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SplitAnnotationInput {
    #[schema(example = "scene_2_track_5")]
    pub scene_track_pattern: String,
    pub person_name: String,
    pub image_paths: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SplitAnnotationResponse {
    pub id: Uuid,
    pub cluster_id: Uuid,
    pub scene_track_pattern: String,
    pub person_name: String,
    pub image_paths: Vec<String>,
}

impl From<crate::entity::split_annotation::Model> for SplitAnnotationResponse {
    fn from(m: crate::entity::split_annotation::Model) -> Self {
        Self {
            id: m.id,
            cluster_id: m.cluster_id,
            scene_track_pattern: m.scene_track_pattern,
            person_name: m.person_name,
            image_paths: m.image_paths,
        }
    }
}

/// Outcome of a workflow mutation.
#[derive(Debug, Serialize, ToSchema)]
pub struct WorkflowResponse {
    /// `outliers_marked`, `cluster_annotated`, `outliers_annotated`, or `split_annotated`.
    #[schema(example = "outliers_marked")]
    pub status: &'static str,
    /// Number of images affected.
    pub count: u64,
}
