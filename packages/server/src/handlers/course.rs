use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::course::*;
use crate::services::content::ContentService;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/",
    tag = "Courses",
    operation_id = "createCourse",
    summary = "Create a course",
    description = "Creates an unapproved draft course owned by the caller. The institute is copied from the caller's profile. Requires `course:create` permission.",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Course created", body = CourseResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(title = %payload.title))]
pub async fn create_course(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("course:create")?;
    validate_create_course(&payload)?;

    let model = ContentService::new(&state.db)
        .create_course(
            auth_user.user_id,
            &payload.title,
            payload.department_id,
            payload.validity_duration,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(CourseResponse::from(model))))
}

#[utoipa::path(
    get,
    path = "/{courseId}",
    tag = "Courses",
    operation_id = "getCourseOutline",
    summary = "Get a course with its sections and lectures",
    description = "Visible to the owner, administrators and students holding an allocation. Returns 404 (not 403) to everyone else.",
    params(("courseId" = i32, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Course outline", body = CourseOutlineResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Course not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn get_course(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<i32>,
) -> Result<Json<CourseOutlineResponse>, AppError> {
    let content = ContentService::new(&state.db);
    let course = content.find_course(course_id).await?;
    content.check_outline_access(&auth_user, &course).await?;

    let outline = content.outline(course_id).await?;
    Ok(Json(CourseOutlineResponse {
        course: outline.course.into(),
        sections: outline
            .sections
            .into_iter()
            .map(|(s, subs)| SectionOutline {
                id: s.id,
                title: s.title,
                position: s.position,
                sub_sections: subs.into_iter().map(Into::into).collect(),
            })
            .collect(),
        total_duration: outline.total_duration,
    }))
}

#[utoipa::path(
    post,
    path = "/{courseId}/review",
    tag = "Courses",
    operation_id = "reviewCourse",
    summary = "Approve or reject a course",
    description = "Sets the approval flag. Only approved courses can be allocated. Requires `course:review` permission.",
    params(("courseId" = i32, Path, description = "Course ID")),
    request_body = ReviewCourseRequest,
    responses(
        (status = 200, description = "Course reviewed", body = CourseResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Course not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(approved = payload.approved))]
pub async fn review_course(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<i32>,
    AppJson(payload): AppJson<ReviewCourseRequest>,
) -> Result<Json<CourseResponse>, AppError> {
    auth_user.require_permission("course:review")?;
    let model = ContentService::new(&state.db)
        .review_course(course_id, payload.approved)
        .await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    post,
    path = "/{courseId}/publish",
    tag = "Courses",
    operation_id = "publishCourse",
    summary = "Publish a draft course",
    description = "Moves the course from Draft to Published. Requires `course:create` permission and ownership.",
    params(("courseId" = i32, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Course published", body = CourseResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Course not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already published (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn publish_course(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<i32>,
) -> Result<Json<CourseResponse>, AppError> {
    auth_user.require_permission("course:create")?;
    let model = ContentService::new(&state.db)
        .publish_course(&auth_user, course_id)
        .await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/{courseId}",
    tag = "Courses",
    operation_id = "deleteCourse",
    summary = "Delete a course and all dependent data",
    description = "Removes sections, lectures, quizzes, answers, completion records, progress and allocations in one transaction. Requires `course:delete` permission and ownership (administrators may delete any course).",
    params(("courseId" = i32, Path, description = "Course ID")),
    responses(
        (status = 204, description = "Course deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Course not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn delete_course(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_permission("course:delete")?;
    ContentService::new(&state.db)
        .delete_course(&auth_user, course_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/{courseId}/sections",
    tag = "Course Content",
    operation_id = "addSection",
    summary = "Append a section to a course",
    description = "Requires `course:create` permission and ownership.",
    params(("courseId" = i32, Path, description = "Course ID")),
    request_body = CreateSectionRequest,
    responses(
        (status = 201, description = "Section created", body = SectionResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Course not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn add_section(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<i32>,
    AppJson(payload): AppJson<CreateSectionRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("course:create")?;
    validate_create_section(&payload)?;
    let model = ContentService::new(&state.db)
        .add_section(&auth_user, course_id, &payload.title)
        .await?;
    Ok((StatusCode::CREATED, Json(SectionResponse::from(model))))
}

#[utoipa::path(
    post,
    path = "/sections/{sectionId}/subsections",
    tag = "Course Content",
    operation_id = "addSubSection",
    summary = "Append a lecture to a section",
    description = "Recomputes the course's lecture count. Requires `course:create` permission and ownership.",
    params(("sectionId" = i32, Path, description = "Section ID")),
    request_body = CreateSubSectionRequest,
    responses(
        (status = 201, description = "Lecture created", body = SubSectionResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Section not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn add_sub_section(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(section_id): Path<i32>,
    AppJson(payload): AppJson<CreateSubSectionRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("course:create")?;
    validate_create_sub_section(&payload)?;
    let model = ContentService::new(&state.db)
        .add_sub_section(
            &auth_user,
            section_id,
            &payload.title,
            payload.time_duration,
            &payload.video_url,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(SubSectionResponse::from(model))))
}

#[utoipa::path(
    delete,
    path = "/subsections/{subSectionId}",
    tag = "Course Content",
    operation_id = "deleteSubSection",
    summary = "Delete a lecture",
    description = "Also removes the lecture's quiz, answers and completion records, and decrements the watched counter of every student who had completed it. Requires `course:create` permission and ownership.",
    params(("subSectionId" = i32, Path, description = "Sub-section ID")),
    responses(
        (status = 204, description = "Lecture deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Sub-section not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn delete_sub_section(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(sub_section_id): Path<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_permission("course:create")?;
    ContentService::new(&state.db)
        .delete_sub_section(&auth_user, sub_section_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
