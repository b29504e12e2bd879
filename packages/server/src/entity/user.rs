use common::Role;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Identity mirror of the external claims provider. The engine only reads it.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,

    pub institute_id: Option<i32>,
    pub department_id: Option<i32>,

    #[sea_orm(has_many)]
    pub courses: HasMany<super::course::Entity>,

    #[sea_orm(has_many)]
    pub allocations: HasMany<super::allocation::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
