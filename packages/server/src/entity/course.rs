use common::CourseStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "course")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,

    pub instructor_id: i32,
    #[sea_orm(belongs_to, from = "instructor_id", to = "id")]
    pub instructor: HasOne<super::user::Entity>,

    pub institute_id: Option<i32>,
    pub department_id: Option<i32>,

    /// Set by an administrator. Unapproved courses cannot be allocated.
    pub approved: bool,
    pub status: CourseStatus,
    pub validity_duration: i32, // in days
    /// Number of sub-sections, recomputed on every structural edit.
    pub total_videos: i32,

    #[sea_orm(has_many)]
    pub sections: HasMany<super::section::Entity>,

    #[sea_orm(has_many)]
    pub allocations: HasMany<super::allocation::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
