use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::quiz::*;
use crate::services::quiz::QuizService;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/create",
    tag = "Quizzes",
    operation_id = "createQuiz",
    summary = "Create the quiz of a lecture",
    description = "Every question needs a prompt, exactly four distinct options and a correct answer equal to one of them (case-sensitive). Nothing is stored when any question is invalid. One quiz per sub-section. Requires `quiz:manage` permission and ownership of the course.",
    request_body = CreateQuizRequest,
    responses(
        (status = 201, description = "Quiz created", body = CreateQuizResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Sub-section not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Quiz already exists (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(sub_section_id = payload.subsection_id, questions = payload.questions.len()))]
pub async fn create_quiz(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("quiz:manage")?;
    validate_create_quiz(&payload)?;

    let quiz = QuizService::new(&state.db)
        .create(&auth_user, &payload)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateQuizResponse { quiz_id: quiz.id }),
    ))
}

#[utoipa::path(
    delete,
    path = "/{subsectionId}",
    tag = "Quizzes",
    operation_id = "deleteQuiz",
    summary = "Delete the quiz of a lecture",
    description = "Removes the quiz, its questions and all submitted answers. Requires `quiz:manage` permission and ownership of the course.",
    params(("subsectionId" = i32, Path, description = "Sub-section ID")),
    responses(
        (status = 204, description = "Quiz deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Quiz not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn delete_quiz(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(subsection_id): Path<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_permission("quiz:manage")?;
    QuizService::new(&state.db)
        .delete(&auth_user, subsection_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/{subsectionId}",
    tag = "Quizzes",
    operation_id = "getQuiz",
    summary = "Get the quiz of a lecture",
    description = "The course owner and administrators receive the answer key (`correctAnswer`); enrolled students receive the questions without it. Returns 404 to everyone else.",
    params(("subsectionId" = i32, Path, description = "Sub-section ID")),
    responses(
        (status = 200, description = "Quiz", body = QuizResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Quiz not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn get_quiz(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(subsection_id): Path<i32>,
) -> Result<Json<QuizResponse>, AppError> {
    let quiz = QuizService::new(&state.db)
        .get(&auth_user, subsection_id)
        .await?;
    Ok(Json(quiz))
}

#[utoipa::path(
    post,
    path = "/submit",
    tag = "Quizzes",
    operation_id = "submitQuiz",
    summary = "Submit answers for a lecture's quiz",
    description = "Replaces every earlier answer of the caller for the sub-section. The replacement is atomic and completes even if the client disconnects. Requires `quiz:submit` permission and enrollment in the course.",
    request_body = SubmitQuizRequest,
    responses(
        (status = 204, description = "Answers stored"),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Quiz not found or not enrolled (NOT_FOUND, NOT_ENROLLED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(student_id = auth_user.user_id, sub_section_id = payload.sub_section_id))]
pub async fn submit_quiz(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<SubmitQuizRequest>,
) -> Result<StatusCode, AppError> {
    auth_user.require_permission("quiz:submit")?;
    validate_submit_quiz(&payload)?;

    // Detached so a client disconnect cannot abort the replacement half-way.
    let db = state.db.clone();
    let student_id = auth_user.user_id;
    tokio::spawn(async move {
        QuizService::new(&db)
            .submit(student_id, payload.sub_section_id, payload.answers)
            .await
    })
    .await
    .map_err(|e| AppError::Internal(format!("Submission task failed: {e}")))??;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/submitted/{courseId}",
    tag = "Quizzes",
    operation_id = "getGradedResults",
    summary = "Grade the caller's quiz submissions in a course",
    description = "Returns a map from sub-section id to the score of that quiz. One point per question whose answer equals the correct answer after trimming both sides (case-sensitive). Quizzes without a submission are omitted. Requires `quiz:submit` permission.",
    params(("courseId" = i32, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Graded results", body = GradedResultsResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Course not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(student_id = auth_user.user_id))]
pub async fn get_graded_results(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<i32>,
) -> Result<Json<GradedResultsResponse>, AppError> {
    auth_user.require_permission("quiz:submit")?;
    let results = QuizService::new(&state.db)
        .grade(auth_user.user_id, course_id)
        .await?;
    Ok(Json(GradedResultsResponse(results)))
}
