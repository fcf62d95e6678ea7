use chrono::{DateTime, Utc};
use common::ImageStatus;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::image;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImageResponse {
    pub id: Uuid,
    pub cluster_id: Uuid,
    pub episode_id: Uuid,
    #[schema(example = "uploads/Friends_S01E05/S01E05_cluster-01/scene_0_track_1_frame_000.jpg")]
    pub file_path: String,
    pub file_name: String,
    pub initial_label: Option<String>,
    pub current_label: Option<String>,
    pub annotation_status: ImageStatus,
    pub annotated_at: Option<DateTime<Utc>>,
    pub is_custom_label: bool,
    pub quality_attributes: Vec<String>,
}

impl From<image::Model> for ImageResponse {
    fn from(m: image::Model) -> Self {
        Self {
            id: m.id,
            cluster_id: m.cluster_id,
            episode_id: m.episode_id,
            file_path: m.file_path,
            file_name: m.file_name,
            initial_label: m.initial_label,
            current_label: m.current_label,
            annotation_status: m.annotation_status,
            annotated_at: m.annotated_at,
            is_custom_label: m.is_custom_label,
            quality_attributes: m.quality_attributes,
        }
    }
}

/// Label for one outlier image.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OutlierAnnotation {
    pub image_id: Uuid,
    #[schema(example = "Chandler")]
    pub person_name: String,
    /// True when the name is not one of the suggested speakers.
    #[serde(default)]
    pub is_custom_label: bool,
    #[serde(default)]
    #[schema(example = json!(["blurry", "profile"]))]
    pub quality_attributes: Vec<String>,
}
