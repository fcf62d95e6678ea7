use common::ClusterStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cluster")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(indexed)]
    pub episode_id: Uuid,
    #[sea_orm(belongs_to, from = "episode_id", to = "id", on_delete = "Cascade")]
    pub episode: HasOne<super::episode::Entity>,

    /// Folder name as found in the archive.
    pub cluster_name: String,
    pub cluster_number: Option<i32>,
    /// Label parsed from the folder name.
    pub initial_label: Option<String>,
    /// Name given by batch annotation.
    pub person_name: Option<String>,
    pub is_single_person: Option<bool>,

    pub annotation_status: ClusterStatus,

    /// Live count of outlier images, recomputed after every mutation.
    pub outlier_count: i32,
    pub has_outliers: bool,

    pub created_at: DateTimeUtc,

    #[sea_orm(has_many)]
    pub images: HasMany<super::image::Entity>,

    #[sea_orm(has_many)]
    pub split_annotations: HasMany<super::split_annotation::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
