use chrono::{DateTime, Utc};
use common::AccessStatus;
use serde::{Deserialize, Serialize};

use super::shared::{validate_bulk_ids, validate_id};
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllocateCourseRequest {
    /// Course to grant.
    #[schema(example = 12)]
    pub course_id: i32,
    /// Students receiving access. Must be non-empty and free of duplicates.
    #[schema(example = json!([31, 32, 33]))]
    pub student_ids: Vec<i32>,
}

/// Why a single student in a batch did not receive access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationFailure {
    /// No user with this id and the student role.
    StudentNotFound,
    /// The student already holds an allocation for the course.
    AlreadyAllocated,
    /// The store rejected the write for another reason (details are logged server-side).
    PersistenceError,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GrantedAllocation {
    pub student_id: i32,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub validity_end_date: DateTime<Utc>,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FailedAllocation {
    pub student_id: i32,
    pub reason: AllocationFailure,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllocateCourseResponse {
    pub course_id: i32,
    pub granted: Vec<GrantedAllocation>,
    pub failed_allocations: Vec<FailedAllocation>,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllocatedStudent {
    pub student_id: i32,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub is_enrolled: bool,
    pub enrollment_date: Option<DateTime<Utc>>,
    pub validity_end_date: DateTime<Utc>,
    /// Derived from `validityEndDate` at read time.
    pub status: AccessStatus,
    /// Completion percentage, 0-100 with two decimals.
    #[schema(example = 40.0)]
    pub progress: f64,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllocatedCourse {
    pub course_id: i32,
    pub title: String,
    pub students: Vec<AllocatedStudent>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct InstructorAllocationsResponse {
    pub courses: Vec<AllocatedCourse>,
}

pub fn validate_allocate_course(
    req: &AllocateCourseRequest,
    max_batch_size: usize,
) -> Result<(), AppError> {
    validate_id(req.course_id, "courseId")?;
    validate_bulk_ids(&req.student_ids, "studentIds", max_batch_size)
}
