use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Time-bounded access grant of one course to one student.
///
/// The (course, student) pair is the primary key, so the store rejects a second grant.
/// Access status is not persisted; it is derived from `validity_end_date` when read.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "allocation")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub course_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub student_id: i32,
    #[sea_orm(belongs_to, from = "course_id", to = "id")]
    pub course: HasOne<super::course::Entity>,
    #[sea_orm(belongs_to, from = "student_id", to = "id")]
    pub student: HasOne<super::user::Entity>,

    pub instructor_id: i32,
    pub institute_id: Option<i32>,
    pub department_id: Option<i32>,

    pub is_enrolled: bool,
    pub enrollment_date: Option<DateTimeUtc>,
    pub validity_end_date: DateTimeUtc,
    /// Floor of the completion percentage, refreshed on every completion event.
    pub progress: i32,
    pub last_accessed: Option<DateTimeUtc>,
    pub rating_id: Option<i32>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
