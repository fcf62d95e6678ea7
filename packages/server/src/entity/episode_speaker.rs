use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Reference speaker list per episode, loaded once from an external script.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "episode_speaker")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub season: i32,
    pub episode_number: i32,
    pub speaker_name: String,
    pub utterances: i32,
}

impl ActiveModelBehavior for ActiveModel {}
