use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::quiz::QuestionError;
use sea_orm::DbErr;
use serde::Serialize;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `TOKEN_MISSING`,
    /// `TOKEN_INVALID`, `PERMISSION_DENIED`, `COURSE_NOT_APPROVED`, `NOT_FOUND`,
    /// `NOT_ALLOCATED`, `NOT_ENROLLED`, `CONFLICT`, `ALREADY_ENROLLED`, `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Question 2: correct answer must be one of the options")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    TokenMissing,
    TokenInvalid,
    PermissionDenied,
    /// The course exists and the caller owns it, but it has not been approved yet.
    CourseNotApproved,
    NotFound(String),
    /// No allocation exists for the (course, student) pair.
    NotAllocated,
    /// The student has no progress record for the course.
    NotEnrolled,
    Conflict(String),
    AlreadyEnrolled,
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_MISSING",
                    message: "Authentication required".into(),
                },
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "TOKEN_INVALID",
                    message: "Invalid or expired token".into(),
                },
            ),
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "PERMISSION_DENIED",
                    message: "Insufficient permissions".into(),
                },
            ),
            AppError::CourseNotApproved => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "COURSE_NOT_APPROVED",
                    message: "Course has not been approved".into(),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::NotAllocated => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_ALLOCATED",
                    message: "Course is not allocated to this student".into(),
                },
            ),
            AppError::NotEnrolled => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_ENROLLED",
                    message: "Student is not enrolled in this course".into(),
                },
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "CONFLICT",
                    message: msg,
                },
            ),
            AppError::AlreadyEnrolled => (
                StatusCode::CONFLICT,
                ErrorBody {
                    code: "ALREADY_ENROLLED",
                    message: "Student is already enrolled in this course".into(),
                },
            ),
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<QuestionError> for AppError {
    fn from(err: QuestionError) -> Self {
        AppError::Validation(err.to_string())
    }
}
