use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "question")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "quiz_serial")]
    pub quiz_id: i32,
    #[sea_orm(belongs_to, from = "quiz_id", to = "id")]
    pub quiz: HasOne<super::quiz::Entity>,

    /// 1-based display position within the quiz.
    #[sea_orm(unique_key = "quiz_serial")]
    pub serial: i32,

    #[sea_orm(column_type = "Text")]
    pub prompt: String,
    /// JSON array of exactly four distinct option strings.
    #[sea_orm(column_type = "JsonBinary")]
    pub options: serde_json::Value,
    pub correct_answer: String,

    #[sea_orm(has_many)]
    pub answers: HasMany<super::answer::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
