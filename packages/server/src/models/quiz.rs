use std::collections::{BTreeMap, HashMap};

use common::quiz::check_question;
use serde::{Deserialize, Serialize};

use super::shared::{validate_id, validate_title};
use crate::error::AppError;

const MAX_QUESTIONS: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 10_000;
const MAX_ANSWER_LEN: usize = 1_000;

#[derive(Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    #[schema(example = "Which keyword declares an immutable binding?")]
    pub prompt: String,
    /// Exactly four distinct options.
    #[schema(example = json!(["let", "mut", "static", "var"]))]
    pub options: Vec<String>,
    /// Must equal one of `options` exactly (case-sensitive).
    #[schema(example = "let")]
    pub correct_answer: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizRequest {
    #[schema(example = 301)]
    pub subsection_id: i32,
    pub title: String,
    pub description: String,
    pub questions: Vec<QuestionInput>,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizResponse {
    pub quiz_id: i32,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionResponse {
    pub question_id: i32,
    pub serial: i32,
    pub prompt: String,
    pub options: Vec<String>,
    /// Present only for the course owner and administrators.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizResponse {
    pub quiz_id: i32,
    pub sub_section_id: i32,
    pub title: String,
    pub description: String,
    pub questions: Vec<QuizQuestionResponse>,
}

#[derive(Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQuizRequest {
    #[schema(example = 301)]
    pub sub_section_id: i32,
    /// Map of question id to answer text. Replaces any earlier submission in full.
    #[schema(example = json!({"17": "let", "18": "Some"}))]
    pub answers: HashMap<i32, String>,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GradedAnswer {
    pub question_id: i32,
    pub serial: i32,
    /// `null` when the question was not answered.
    pub answer: Option<String>,
    pub is_correct: bool,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub total_points: u32,
    pub scored_points: u32,
    pub answers: Vec<GradedAnswer>,
}

/// Graded results keyed by sub-section id. Quizzes the student never attempted are absent.
#[derive(Serialize, utoipa::ToSchema)]
pub struct GradedResultsResponse(pub BTreeMap<i32, QuizResult>);

pub fn validate_create_quiz(req: &CreateQuizRequest) -> Result<(), AppError> {
    validate_id(req.subsection_id, "subsectionId")?;
    validate_title(&req.title)?;
    if req.description.trim().is_empty() || req.description.len() > MAX_DESCRIPTION_LEN {
        return Err(AppError::Validation(format!(
            "Description must be non-empty and at most {MAX_DESCRIPTION_LEN} bytes"
        )));
    }
    if req.questions.is_empty() {
        return Err(AppError::Validation(
            "A quiz needs at least one question".into(),
        ));
    }
    if req.questions.len() > MAX_QUESTIONS {
        return Err(AppError::Validation(format!(
            "Too many questions: max {MAX_QUESTIONS}"
        )));
    }
    for (i, q) in req.questions.iter().enumerate() {
        check_question(i + 1, &q.prompt, &q.options, &q.correct_answer)?;
    }
    Ok(())
}

pub fn validate_submit_quiz(req: &SubmitQuizRequest) -> Result<(), AppError> {
    validate_id(req.sub_section_id, "subSectionId")?;
    if req.answers.is_empty() {
        return Err(AppError::Validation("answers must not be empty".into()));
    }
    if req.answers.values().any(|a| a.len() > MAX_ANSWER_LEN) {
        return Err(AppError::Validation(format!(
            "Answers must be at most {MAX_ANSWER_LEN} bytes"
        )));
    }
    Ok(())
}
