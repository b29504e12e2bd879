use chrono::{DateTime, Utc};
use common::AccessStatus;
use serde::{Deserialize, Serialize};

use super::shared::validate_id;
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    #[schema(example = 12)]
    pub course_id: i32,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentResponse {
    pub course_id: i32,
    pub enrollment_date: DateTime<Utc>,
    pub validity_end_date: DateTime<Utc>,
}

#[derive(Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkCompleteRequest {
    #[schema(example = 12)]
    pub course_id: i32,
    #[schema(example = 301)]
    pub sub_section_id: i32,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnenrolledCourse {
    pub course_id: i32,
    pub title: String,
    pub instructor_name: String,
    pub validity_end_date: DateTime<Utc>,
    pub status: AccessStatus,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UnenrolledCoursesResponse {
    pub allocations: Vec<UnenrolledCourse>,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledCourse {
    pub course_id: i32,
    pub title: String,
    pub enrollment_date: Option<DateTime<Utc>>,
    pub validity_end_date: DateTime<Utc>,
    pub status: AccessStatus,
    /// Completion percentage, 0-100 with two decimals.
    pub progress: f64,
    pub rating_id: Option<i32>,
    /// Sum of all lecture durations in seconds.
    pub total_duration: i64,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EnrolledCoursesResponse {
    pub courses: Vec<EnrolledCourse>,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReportResponse {
    pub course_id: i32,
    #[schema(example = 40.0)]
    pub percentage: f64,
    pub watched_lectures: i32,
    pub total_videos: i32,
    /// Completed sub-section ids, ascending.
    pub completed_videos: Vec<i32>,
    pub last_accessed: DateTime<Utc>,
}

pub fn validate_enroll(req: &EnrollRequest) -> Result<(), AppError> {
    validate_id(req.course_id, "courseId")
}

pub fn validate_mark_complete(req: &MarkCompleteRequest) -> Result<(), AppError> {
    validate_id(req.course_id, "courseId")?;
    validate_id(req.sub_section_id, "subSectionId")
}
