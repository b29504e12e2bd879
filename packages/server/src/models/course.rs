use chrono::{DateTime, Utc};
use common::CourseStatus;
use serde::{Deserialize, Serialize};

use super::shared::validate_title;
use crate::entity::{course, section, sub_section};
use crate::error::AppError;

const MAX_VALIDITY_DAYS: i32 = 3650;

#[derive(Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseRequest {
    #[schema(example = "Systems Programming in Rust")]
    pub title: String,
    pub department_id: Option<i32>,
    /// Access window in days granted by each allocation. Defaults to 30.
    #[schema(example = 30)]
    pub validity_duration: Option<i32>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ReviewCourseRequest {
    pub approved: bool,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateSectionRequest {
    pub title: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubSectionRequest {
    pub title: String,
    /// Lecture length in seconds.
    #[schema(example = 540)]
    pub time_duration: i32,
    pub video_url: String,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseResponse {
    pub id: i32,
    pub title: String,
    pub instructor_id: i32,
    pub institute_id: Option<i32>,
    pub department_id: Option<i32>,
    pub approved: bool,
    pub status: CourseStatus,
    pub validity_duration: i32,
    pub total_videos: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SectionResponse {
    pub id: i32,
    pub course_id: i32,
    pub title: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubSectionResponse {
    pub id: i32,
    pub section_id: i32,
    pub title: String,
    pub time_duration: i32,
    pub video_url: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SectionOutline {
    pub id: i32,
    pub title: String,
    pub position: i32,
    pub sub_sections: Vec<SubSectionResponse>,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseOutlineResponse {
    pub course: CourseResponse,
    pub sections: Vec<SectionOutline>,
    /// Sum of all lecture durations in seconds.
    pub total_duration: i64,
}

impl From<course::Model> for CourseResponse {
    fn from(m: course::Model) -> Self {
        Self {
            id: m.id,
            title: m.title,
            instructor_id: m.instructor_id,
            institute_id: m.institute_id,
            department_id: m.department_id,
            approved: m.approved,
            status: m.status,
            validity_duration: m.validity_duration,
            total_videos: m.total_videos,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

impl From<section::Model> for SectionResponse {
    fn from(m: section::Model) -> Self {
        Self {
            id: m.id,
            course_id: m.course_id,
            title: m.title,
            position: m.position,
            created_at: m.created_at,
        }
    }
}

impl From<sub_section::Model> for SubSectionResponse {
    fn from(m: sub_section::Model) -> Self {
        Self {
            id: m.id,
            section_id: m.section_id,
            title: m.title,
            time_duration: m.time_duration,
            video_url: m.video_url,
            position: m.position,
            created_at: m.created_at,
        }
    }
}

pub fn validate_create_course(req: &CreateCourseRequest) -> Result<(), AppError> {
    validate_title(&req.title)?;
    if let Some(days) = req.validity_duration
        && !(1..=MAX_VALIDITY_DAYS).contains(&days)
    {
        return Err(AppError::Validation(format!(
            "validityDuration must be between 1 and {MAX_VALIDITY_DAYS} days"
        )));
    }
    Ok(())
}

pub fn validate_create_section(req: &CreateSectionRequest) -> Result<(), AppError> {
    validate_title(&req.title)
}

pub fn validate_create_sub_section(req: &CreateSubSectionRequest) -> Result<(), AppError> {
    validate_title(&req.title)?;
    if req.time_duration < 0 {
        return Err(AppError::Validation("timeDuration must be >= 0".into()));
    }
    let url = req.video_url.trim();
    if url.is_empty() || url.len() > 2048 {
        return Err(AppError::Validation(
            "videoUrl must be 1-2048 characters".into(),
        ));
    }
    Ok(())
}
