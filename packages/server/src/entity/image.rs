use common::ImageStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "image")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub cluster_id: Uuid,
    #[sea_orm(belongs_to, from = "cluster_id", to = "id", on_delete = "Cascade")]
    pub cluster: HasOne<super::cluster::Entity>,

    /// Deletion goes through the cluster; this reference does not cascade.
    #[sea_orm(indexed)]
    pub episode_id: Uuid,
    #[sea_orm(belongs_to, from = "episode_id", to = "id")]
    pub episode: HasOne<super::episode::Entity>,

    /// `uploads/<episode>/<cluster>/<file>`. Unique per cluster.
    pub file_path: String,
    pub file_name: String,

    pub initial_label: Option<String>,
    pub current_label: Option<String>,

    pub annotation_status: ImageStatus,
    pub annotated_at: Option<DateTimeUtc>,
    #[sea_orm(default_value = false)]
    pub is_custom_label: bool,

    /// Short defect markers such as `blurry` or `profile`.
    pub quality_attributes: Vec<String>,
}

impl ActiveModelBehavior for ActiveModel {}
