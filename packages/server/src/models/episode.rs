use chrono::{DateTime, Utc};
use common::EpisodeStatus;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::episode;

#[derive(Debug, Serialize, ToSchema)]
pub struct EpisodeResponse {
    pub id: Uuid,
    #[schema(example = "Friends_S01E05")]
    pub name: String,
    pub upload_timestamp: DateTime<Utc>,
    pub status: EpisodeStatus,
    pub total_clusters: i32,
    pub annotated_clusters: i32,
    pub season: Option<i32>,
    pub episode_number: Option<i32>,
}

impl From<episode::Model> for EpisodeResponse {
    fn from(m: episode::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            upload_timestamp: m.upload_timestamp,
            status: m.status,
            total_clusters: m.total_clusters,
            annotated_clusters: m.annotated_clusters,
            season: m.season,
            episode_number: m.episode_number,
        }
    }
}

/// Speaker suggestions for the annotation UI, most talkative first.
#[derive(Debug, Serialize, ToSchema)]
pub struct SpeakersResponse {
    pub episode_id: Uuid,
    pub season: Option<i32>,
    pub episode_number: Option<i32>,
    #[schema(example = json!(["Rachel", "Ross", "Monica"]))]
    pub speakers: Vec<String>,
}

/// Images sharing one label across all clusters of an episode.
#[derive(Debug, Serialize, ToSchema)]
pub struct PileResponse {
    /// Lowercased label.
    pub label: String,
    pub image_count: usize,
    pub cluster_ids: Vec<Uuid>,
    pub image_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PilesResponse {
    pub episode_id: Uuid,
    pub piles: Vec<PileResponse>,
}

/// Every distinct label of an episode's images, for the name picker.
#[derive(Debug, Serialize, ToSchema)]
pub struct LabelsResponse {
    pub episode_id: Uuid,
    #[schema(example = json!(["Chandler", "Rachel"]))]
    pub labels: Vec<String>,
}
