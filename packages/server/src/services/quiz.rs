use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use common::Role;
use common::quiz::grade;
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr, TransactionTrait,
};
use tracing::info;

use crate::entity::{answer, question, quiz, section, sub_section};
use crate::error::AppError;
use crate::extractors::auth::AuthUser;
use crate::models::quiz::{
    CreateQuizRequest, GradedAnswer, QuizQuestionResponse, QuizResponse, QuizResult,
};
use crate::services::content::{
    course_of_sub_section, delete_quiz_rows, ensure_course_owner, find_course,
};
use crate::services::progress::ProgressService;

/// Quiz definitions, answer submission and grading.
pub struct QuizService<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait + TransactionTrait<Transaction = DatabaseTransaction>> QuizService<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Create the quiz of a lecture. The request must already be validated.
    pub async fn create(
        &self,
        auth_user: &AuthUser,
        req: &CreateQuizRequest,
    ) -> Result<quiz::Model, AppError> {
        let (lecture, course) = course_of_sub_section(self.conn, req.subsection_id).await?;
        ensure_course_owner(auth_user, &course)?;
        if self.find_by_sub_section(lecture.id).await?.is_some() {
            return Err(AppError::Conflict(
                "A quiz already exists for this sub-section".into(),
            ));
        }

        let txn = self.conn.begin().await?;
        let created = quiz::ActiveModel {
            sub_section_id: Set(lecture.id),
            title: Set(req.title.trim().to_string()),
            description: Set(req.description.trim().to_string()),
            created_by: Set(auth_user.user_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await;
        let created = match created {
            Ok(m) => m,
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                return Err(AppError::Conflict(
                    "A quiz already exists for this sub-section".into(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let questions = req
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let serial = i32::try_from(i + 1)
                    .map_err(|_| AppError::Validation("Too many questions".into()))?;
                Ok(question::ActiveModel {
                    quiz_id: Set(created.id),
                    serial: Set(serial),
                    prompt: Set(q.prompt.trim().to_string()),
                    options: Set(serde_json::Value::from(q.options.clone())),
                    correct_answer: Set(q.correct_answer.clone()),
                    ..Default::default()
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;
        question::Entity::insert_many(questions)
            .exec_without_returning(&txn)
            .await?;

        txn.commit().await?;

        info!(
            quiz_id = created.id,
            sub_section_id = lecture.id,
            course_id = course.id,
            questions = req.questions.len(),
            "Quiz created"
        );
        Ok(created)
    }

    /// Delete a lecture's quiz along with its questions and every submitted answer.
    pub async fn delete(&self, auth_user: &AuthUser, sub_section_id: i32) -> Result<(), AppError> {
        let (_, course) = course_of_sub_section(self.conn, sub_section_id).await?;
        ensure_course_owner(auth_user, &course)?;

        let txn = self.conn.begin().await?;
        let deleted = delete_quiz_rows(&txn, &[sub_section_id]).await?;
        if deleted == 0 {
            return Err(AppError::NotFound("Quiz not found".into()));
        }
        txn.commit().await?;

        info!(sub_section_id, course_id = course.id, "Quiz deleted");
        Ok(())
    }

    /// Quiz as seen by the caller. Only the owner and administrators see the answer key;
    /// enrolled students get the questions without it; anyone else gets 404.
    pub async fn get(
        &self,
        auth_user: &AuthUser,
        sub_section_id: i32,
    ) -> Result<QuizResponse, AppError> {
        let (_, course) = course_of_sub_section(self.conn, sub_section_id).await?;

        let reveal_key = if ensure_course_owner(auth_user, &course).is_ok() {
            true
        } else if auth_user.role == Role::Student
            && ProgressService::new(self.conn)
                .is_enrolled(course.id, auth_user.user_id)
                .await?
        {
            false
        } else {
            return Err(AppError::NotFound("Quiz not found".into()));
        };

        let quiz = self
            .find_by_sub_section(sub_section_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz not found".into()))?;
        let questions = self.questions_of(&[quiz.id]).await?;

        let questions = questions
            .into_iter()
            .map(|q| {
                Ok(QuizQuestionResponse {
                    question_id: q.id,
                    serial: q.serial,
                    prompt: q.prompt,
                    options: decode_options(q.options)?,
                    correct_answer: reveal_key.then_some(q.correct_answer),
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        Ok(QuizResponse {
            quiz_id: quiz.id,
            sub_section_id: quiz.sub_section_id,
            title: quiz.title,
            description: quiz.description,
            questions,
        })
    }

    /// Replace a student's answers for one lecture's quiz. Returns the number of stored answers.
    ///
    /// Everything is checked before the old answers are removed; delete and insert share
    /// one transaction so a resubmission is all-or-nothing.
    pub async fn submit(
        &self,
        student_id: i32,
        sub_section_id: i32,
        answers: HashMap<i32, String>,
    ) -> Result<usize, AppError> {
        if answers.is_empty() {
            return Err(AppError::Validation("answers must not be empty".into()));
        }
        let quiz = self
            .find_by_sub_section(sub_section_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Quiz not found".into()))?;
        let (_, course) = course_of_sub_section(self.conn, sub_section_id).await?;
        if !ProgressService::new(self.conn)
            .is_enrolled(course.id, student_id)
            .await?
        {
            return Err(AppError::NotEnrolled);
        }

        let known: HashSet<i32> = self
            .questions_of(&[quiz.id])
            .await?
            .into_iter()
            .map(|q| q.id)
            .collect();
        let mut unknown: Vec<i32> = answers
            .keys()
            .copied()
            .filter(|id| !known.contains(id))
            .collect();
        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(AppError::Validation(format!(
                "Questions {unknown:?} do not belong to this quiz"
            )));
        }

        let now = Utc::now();
        let count = answers.len();
        let rows: Vec<answer::ActiveModel> = answers
            .into_iter()
            .map(|(question_id, text)| answer::ActiveModel {
                student_id: Set(student_id),
                sub_section_id: Set(sub_section_id),
                question_id: Set(question_id),
                answer: Set(text),
                submitted_at: Set(now),
                ..Default::default()
            })
            .collect();

        let txn = self.conn.begin().await?;
        answer::Entity::delete_many()
            .filter(answer::Column::StudentId.eq(student_id))
            .filter(answer::Column::SubSectionId.eq(sub_section_id))
            .exec(&txn)
            .await?;
        answer::Entity::insert_many(rows)
            .exec_without_returning(&txn)
            .await?;
        txn.commit().await?;

        info!(
            student_id,
            sub_section_id,
            quiz_id = quiz.id,
            answers = count,
            "Quiz answers replaced"
        );
        Ok(count)
    }

    /// Score every attempted quiz of a course for one student, keyed by sub-section id.
    pub async fn grade(
        &self,
        student_id: i32,
        course_id: i32,
    ) -> Result<BTreeMap<i32, QuizResult>, AppError> {
        find_course(self.conn, course_id).await?;

        let quizzes = quiz::Entity::find()
            .filter(
                quiz::Column::SubSectionId.in_subquery(
                    Query::select()
                        .column(sub_section::Column::Id)
                        .from(sub_section::Entity)
                        .and_where(
                            sub_section::Column::SectionId.in_subquery(
                                Query::select()
                                    .column(section::Column::Id)
                                    .from(section::Entity)
                                    .and_where(section::Column::CourseId.eq(course_id))
                                    .to_owned(),
                            ),
                        )
                        .to_owned(),
                ),
            )
            .all(self.conn)
            .await?;
        if quizzes.is_empty() {
            return Ok(BTreeMap::new());
        }

        let mut submitted: HashMap<i32, HashMap<i32, String>> = HashMap::new();
        for a in answer::Entity::find()
            .filter(answer::Column::StudentId.eq(student_id))
            .filter(answer::Column::SubSectionId.is_in(quizzes.iter().map(|q| q.sub_section_id)))
            .all(self.conn)
            .await?
        {
            submitted
                .entry(a.sub_section_id)
                .or_default()
                .insert(a.question_id, a.answer);
        }

        let attempted: Vec<&quiz::Model> = quizzes
            .iter()
            .filter(|q| submitted.contains_key(&q.sub_section_id))
            .collect();
        if attempted.is_empty() {
            return Ok(BTreeMap::new());
        }
        let quiz_ids: Vec<i32> = attempted.iter().map(|q| q.id).collect();
        let mut questions: HashMap<i32, Vec<question::Model>> = HashMap::new();
        for q in self.questions_of(&quiz_ids).await? {
            questions.entry(q.quiz_id).or_default().push(q);
        }

        let mut results = BTreeMap::new();
        for quiz in attempted {
            let Some(answers) = submitted.get(&quiz.sub_section_id) else {
                continue;
            };
            let key = questions.get(&quiz.id).map(Vec::as_slice).unwrap_or_default();
            let score = grade(
                key.iter().map(|q| (q.id, q.correct_answer.as_str())),
                answers,
            );
            let serials: HashMap<i32, i32> = key.iter().map(|q| (q.id, q.serial)).collect();

            results.insert(
                quiz.sub_section_id,
                QuizResult {
                    total_points: score.total_points,
                    scored_points: score.scored_points,
                    answers: score
                        .questions
                        .into_iter()
                        .map(|g| GradedAnswer {
                            question_id: g.question_id,
                            serial: serials.get(&g.question_id).copied().unwrap_or_default(),
                            answer: g.answer,
                            is_correct: g.is_correct,
                        })
                        .collect(),
                },
            );
        }

        info!(
            student_id,
            course_id,
            graded = results.len(),
            "Quiz results graded"
        );
        Ok(results)
    }

    async fn find_by_sub_section(&self, sub_section_id: i32) -> Result<Option<quiz::Model>, AppError> {
        Ok(quiz::Entity::find()
            .filter(quiz::Column::SubSectionId.eq(sub_section_id))
            .one(self.conn)
            .await?)
    }

    /// Questions of the given quizzes ordered by quiz then serial.
    async fn questions_of(&self, quiz_ids: &[i32]) -> Result<Vec<question::Model>, AppError> {
        Ok(question::Entity::find()
            .filter(question::Column::QuizId.is_in(quiz_ids.to_vec()))
            .order_by_asc(question::Column::QuizId)
            .order_by_asc(question::Column::Serial)
            .all(self.conn)
            .await?)
    }
}

fn decode_options(raw: serde_json::Value) -> Result<Vec<String>, AppError> {
    serde_json::from_value(raw)
        .map_err(|e| AppError::Internal(format!("Corrupt question options: {e}")))
}
