use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Manual re-partition of a multi-person cluster.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "split_annotation")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(indexed)]
    pub cluster_id: Uuid,
    #[sea_orm(belongs_to, from = "cluster_id", to = "id", on_delete = "Cascade")]
    pub cluster: HasOne<super::cluster::Entity>,

    /// e.g. `scene_2_track_5`
    pub scene_track_pattern: String,
    pub person_name: String,
    pub image_paths: Vec<String>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
