use axum::Json;
use axum::extract::State;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::allocation::*;
use crate::services::allocation::AllocationService;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/allocate",
    tag = "Allocations",
    operation_id = "allocateCourse",
    summary = "Grant a course to a batch of students",
    description = "Creates one allocation per student. Course-level checks (ownership, approval) fail the whole request; after that each student is attempted independently and reported as granted or failed with a reason (`STUDENT_NOT_FOUND`, `ALREADY_ALLOCATED`, `PERSISTENCE_ERROR`). Requires `course:allocate` permission.",
    request_body = AllocateCourseRequest,
    responses(
        (status = 200, description = "Batch settled", body = AllocateCourseResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED, COURSE_NOT_APPROVED)", body = ErrorBody),
        (status = 404, description = "Course not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(course_id = payload.course_id, students = payload.student_ids.len()))]
pub async fn allocate_course(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<AllocateCourseRequest>,
) -> Result<Json<AllocateCourseResponse>, AppError> {
    auth_user.require_permission("course:allocate")?;
    validate_allocate_course(&payload, state.config.allocation.max_batch_size)?;

    let outcome = AllocationService::new(&state.db)
        .allocate(
            auth_user.user_id,
            payload.course_id,
            &payload.student_ids,
            state.config.allocation.concurrency,
        )
        .await?;

    Ok(Json(AllocateCourseResponse {
        course_id: payload.course_id,
        granted: outcome.granted,
        failed_allocations: outcome.failed,
    }))
}

#[utoipa::path(
    get,
    path = "/allocations",
    tag = "Allocations",
    operation_id = "listInstructorAllocations",
    summary = "List allocated students per course",
    description = "Returns every course owned by the caller that has at least one allocation, with the allocated students, their enrollment state, effective access status and progress. Requires `course:allocate` permission.",
    responses(
        (status = 200, description = "Allocations grouped by course", body = InstructorAllocationsResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(instructor_id = auth_user.user_id))]
pub async fn list_allocations(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<InstructorAllocationsResponse>, AppError> {
    auth_user.require_permission("course:allocate")?;

    let courses = AllocationService::new(&state.db)
        .list_for_instructor(auth_user.user_id)
        .await?;

    Ok(Json(InstructorAllocationsResponse { courses }))
}
