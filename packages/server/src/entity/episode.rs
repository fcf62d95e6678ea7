use common::EpisodeStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One uploaded video episode.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "episode")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Sanitized archive stem. Unique case-insensitively (see `seed::ensure_indexes`).
    pub name: String,

    pub upload_timestamp: DateTimeUtc,

    pub status: EpisodeStatus,

    pub total_clusters: i32,
    /// Never exceeds `total_clusters`.
    pub annotated_clusters: i32,

    pub season: Option<i32>,
    pub episode_number: Option<i32>,

    #[sea_orm(has_many)]
    pub clusters: HasMany<super::cluster::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
