use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A single video lecture.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sub_section")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,
    pub time_duration: i32, // in seconds
    pub video_url: String,
    pub position: i32,

    pub section_id: i32,
    #[sea_orm(belongs_to, from = "section_id", to = "id")]
    pub section: HasOne<super::section::Entity>,

    #[sea_orm(has_one)]
    pub quiz: HasOne<super::quiz::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
