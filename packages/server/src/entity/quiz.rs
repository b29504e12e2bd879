use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quiz")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub sub_section_id: i32,
    #[sea_orm(belongs_to, from = "sub_section_id", to = "id")]
    pub sub_section: HasOne<super::sub_section::Entity>,

    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub created_by: i32,

    #[sea_orm(has_many)]
    pub questions: HasMany<super::question::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
