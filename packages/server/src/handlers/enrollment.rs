use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::progress::*;
use crate::services::progress::ProgressService;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/unenrolled",
    tag = "Enrollment",
    operation_id = "listUnenrolledCourses",
    summary = "List allocated courses not yet enrolled",
    description = "Allocations of the caller that have not been activated, with the effective access status derived from the validity end date. Requires `course:enroll` permission.",
    responses(
        (status = 200, description = "Pending allocations", body = UnenrolledCoursesResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(student_id = auth_user.user_id))]
pub async fn list_unenrolled(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UnenrolledCoursesResponse>, AppError> {
    auth_user.require_permission("course:enroll")?;
    let allocations = ProgressService::new(&state.db)
        .list_unenrolled(auth_user.user_id)
        .await?;
    Ok(Json(UnenrolledCoursesResponse { allocations }))
}

#[utoipa::path(
    post,
    path = "/enroll",
    tag = "Enrollment",
    operation_id = "enrollInCourse",
    summary = "Activate an allocation",
    description = "Marks the caller's allocation for the course as enrolled and creates the progress record. Can succeed only once per course. Requires `course:enroll` permission.",
    request_body = EnrollRequest,
    responses(
        (status = 200, description = "Enrolled", body = EnrollmentResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "No allocation (NOT_ALLOCATED)", body = ErrorBody),
        (status = 409, description = "Already enrolled (ALREADY_ENROLLED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(student_id = auth_user.user_id, course_id = payload.course_id))]
pub async fn enroll(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<EnrollRequest>,
) -> Result<Json<EnrollmentResponse>, AppError> {
    auth_user.require_permission("course:enroll")?;
    validate_enroll(&payload)?;

    // Detached so a client disconnect cannot abort the transaction half-way.
    let db = state.db.clone();
    let student_id = auth_user.user_id;
    let outcome = tokio::spawn(async move {
        ProgressService::new(&db)
            .enroll(payload.course_id, student_id)
            .await
    })
    .await
    .map_err(|e| AppError::Internal(format!("Enrollment task failed: {e}")))??;

    Ok(Json(EnrollmentResponse {
        course_id: outcome.course_id,
        enrollment_date: outcome.enrollment_date,
        validity_end_date: outcome.validity_end_date,
    }))
}

#[utoipa::path(
    get,
    path = "/enrolled",
    tag = "Enrollment",
    operation_id = "listEnrolledCourses",
    summary = "List enrolled courses with progress",
    description = "Activated allocations of the caller with completion percentage, rating link and total lecture duration. Requires `course:enroll` permission.",
    responses(
        (status = 200, description = "Enrolled courses", body = EnrolledCoursesResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(student_id = auth_user.user_id))]
pub async fn list_enrolled(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<EnrolledCoursesResponse>, AppError> {
    auth_user.require_permission("course:enroll")?;
    let courses = ProgressService::new(&state.db)
        .list_enrolled(auth_user.user_id)
        .await?;
    Ok(Json(EnrolledCoursesResponse { courses }))
}

#[utoipa::path(
    post,
    path = "/markComplete",
    tag = "Progress",
    operation_id = "markLectureComplete",
    summary = "Record a completed lecture",
    description = "Adds the sub-section to the caller's completed set. Repeating the call for the same sub-section is a no-op apart from refreshing the last-accessed time. Requires `course:progress` permission.",
    request_body = MarkCompleteRequest,
    responses(
        (status = 204, description = "Recorded"),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Not enrolled or sub-section not in course (NOT_ENROLLED, NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(student_id = auth_user.user_id, course_id = payload.course_id, sub_section_id = payload.sub_section_id))]
pub async fn mark_complete(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<MarkCompleteRequest>,
) -> Result<StatusCode, AppError> {
    auth_user.require_permission("course:progress")?;
    validate_mark_complete(&payload)?;

    ProgressService::new(&state.db)
        .mark_complete(payload.course_id, auth_user.user_id, payload.sub_section_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/{courseId}/progress",
    tag = "Progress",
    operation_id = "getCourseProgress",
    summary = "Get the caller's progress in a course",
    description = "Completion percentage (two decimals), watched and total lecture counts and the completed sub-section ids. Requires `course:progress` permission.",
    params(("courseId" = i32, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Progress report", body = ProgressReportResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Course not found or not enrolled (NOT_FOUND, NOT_ENROLLED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(student_id = auth_user.user_id))]
pub async fn get_progress(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<i32>,
) -> Result<Json<ProgressReportResponse>, AppError> {
    auth_user.require_permission("course:progress")?;

    let report = ProgressService::new(&state.db)
        .report(course_id, auth_user.user_id)
        .await?;

    Ok(Json(ProgressReportResponse {
        course_id,
        percentage: report.percentage,
        watched_lectures: report.watched_lectures,
        total_videos: report.total_videos,
        completed_videos: report.completed,
        last_accessed: report.last_accessed,
    }))
}
