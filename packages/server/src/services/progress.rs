use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::AccessStatus;
use common::progress::{completion_percentage, completion_percentage_floor};
use sea_orm::sea_query::{Expr, ExprTrait, LockType, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, SqlErr, TransactionTrait,
};
use tracing::info;

use crate::entity::{allocation, completed_lecture, course, progress, sub_section, user};
use crate::error::AppError;
use crate::models::progress::{EnrolledCourse, UnenrolledCourse};
use crate::services::content::{ContentService, course_of_sub_section, find_course};

pub struct EnrollmentOutcome {
    pub course_id: i32,
    pub enrollment_date: DateTime<Utc>,
    pub validity_end_date: DateTime<Utc>,
}

pub struct ProgressReport {
    pub percentage: f64,
    pub watched_lectures: i32,
    pub total_videos: i32,
    /// Ascending sub-section ids.
    pub completed: Vec<i32>,
    pub last_accessed: DateTime<Utc>,
}

/// Enrollment activation and per-lecture completion tracking.
pub struct ProgressService<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait + TransactionTrait<Transaction = DatabaseTransaction>> ProgressService<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Activate an allocation: `is_enrolled` goes false → true exactly once and the
    /// progress record is created.
    pub async fn enroll(
        &self,
        course_id: i32,
        student_id: i32,
    ) -> Result<EnrollmentOutcome, AppError> {
        let txn = self.conn.begin().await?;

        let existing = allocation::Entity::find_by_id((course_id, student_id))
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or(AppError::NotAllocated)?;
        if existing.is_enrolled {
            return Err(AppError::AlreadyEnrolled);
        }

        let now = Utc::now();
        let record = progress::ActiveModel {
            course_id: Set(course_id),
            student_id: Set(student_id),
            watched_lectures: Set(0),
            last_accessed: Set(now),
            created_at: Set(now),
            ..Default::default()
        };
        match record.insert(&txn).await {
            Ok(_) => {}
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                return Err(AppError::AlreadyEnrolled);
            }
            Err(e) => return Err(e.into()),
        }

        let validity_end_date = existing.validity_end_date;
        let mut active: allocation::ActiveModel = existing.into();
        active.is_enrolled = Set(true);
        active.enrollment_date = Set(Some(now));
        active.update(&txn).await?;

        txn.commit().await?;

        info!(course_id, student_id, "Student enrolled");
        Ok(EnrollmentOutcome {
            course_id,
            enrollment_date: now,
            validity_end_date,
        })
    }

    /// Record that a student finished a lecture. Returns whether this was the first time.
    ///
    /// Completing the same lecture again only touches `last_accessed`.
    pub async fn mark_complete(
        &self,
        course_id: i32,
        student_id: i32,
        sub_section_id: i32,
    ) -> Result<bool, AppError> {
        if progress::Entity::find_by_id((course_id, student_id))
            .one(self.conn)
            .await?
            .is_none()
        {
            return Err(AppError::NotEnrolled);
        }
        let (_, course) = course_of_sub_section(self.conn, sub_section_id).await?;
        if course.id != course_id {
            return Err(AppError::NotFound(
                "Sub-section not found in this course".into(),
            ));
        }

        let now = Utc::now();
        let txn = self.conn.begin().await?;

        // Structural edits hold the course row FOR UPDATE, so a share lock orders this
        // completion strictly before or after any concurrent lecture deletion.
        let course = course::Entity::find_by_id(course_id)
            .lock(LockType::Share)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Course not found".into()))?;
        if sub_section::Entity::find_by_id(sub_section_id)
            .one(&txn)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(
                "Sub-section not found in this course".into(),
            ));
        }

        let result = completed_lecture::Entity::insert(completed_lecture::ActiveModel {
            course_id: Set(course_id),
            student_id: Set(student_id),
            sub_section_id: Set(sub_section_id),
            completed_at: Set(now),
            ..Default::default()
        })
        .on_conflict(
            OnConflict::columns([
                completed_lecture::Column::CourseId,
                completed_lecture::Column::StudentId,
                completed_lecture::Column::SubSectionId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(&txn)
        .await;
        let inserted = match result {
            Ok(rows) => rows > 0,
            Err(DbErr::RecordNotInserted) => false,
            Err(e) => return Err(e.into()),
        };

        let mut update = progress::Entity::update_many()
            .col_expr(progress::Column::LastAccessed, Expr::value(now))
            .filter(progress::Column::CourseId.eq(course_id))
            .filter(progress::Column::StudentId.eq(student_id));
        if inserted {
            update = update.col_expr(
                progress::Column::WatchedLectures,
                Expr::col(progress::Column::WatchedLectures).add(1),
            );
        }
        update.exec(&txn).await?;

        let watched: i32 = progress::Entity::find_by_id((course_id, student_id))
            .select_only()
            .column(progress::Column::WatchedLectures)
            .into_tuple()
            .one(&txn)
            .await?
            .ok_or(AppError::NotEnrolled)?;

        allocation::Entity::update_many()
            .col_expr(
                allocation::Column::Progress,
                Expr::value(completion_percentage_floor(watched, course.total_videos)),
            )
            .col_expr(allocation::Column::LastAccessed, Expr::value(Some(now)))
            .filter(allocation::Column::CourseId.eq(course_id))
            .filter(allocation::Column::StudentId.eq(student_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        info!(
            course_id,
            student_id,
            sub_section_id,
            inserted,
            watched_lectures = watched,
            "Lecture completion recorded"
        );
        Ok(inserted)
    }

    /// Completion percentage, 0 when the student never enrolled or the course has no lectures.
    pub async fn percentage(&self, course_id: i32, student_id: i32) -> Result<f64, AppError> {
        let course = find_course(self.conn, course_id).await?;
        let watched = progress::Entity::find_by_id((course_id, student_id))
            .one(self.conn)
            .await?
            .map(|p| p.watched_lectures)
            .unwrap_or(0);
        Ok(completion_percentage(watched, course.total_videos))
    }

    /// Full progress of an enrolled student. Fails with `NotEnrolled` where `percentage`
    /// would report 0.
    pub async fn report(&self, course_id: i32, student_id: i32) -> Result<ProgressReport, AppError> {
        let course = find_course(self.conn, course_id).await?;
        let record = progress::Entity::find_by_id((course_id, student_id))
            .one(self.conn)
            .await?
            .ok_or(AppError::NotEnrolled)?;
        let percentage = self.percentage(course_id, student_id).await?;

        let completed: Vec<i32> = completed_lecture::Entity::find()
            .filter(completed_lecture::Column::CourseId.eq(course_id))
            .filter(completed_lecture::Column::StudentId.eq(student_id))
            .select_only()
            .column(completed_lecture::Column::SubSectionId)
            .order_by_asc(completed_lecture::Column::SubSectionId)
            .into_tuple()
            .all(self.conn)
            .await?;

        Ok(ProgressReport {
            percentage,
            watched_lectures: record.watched_lectures,
            total_videos: course.total_videos,
            completed,
            last_accessed: record.last_accessed,
        })
    }

    pub async fn is_enrolled(&self, course_id: i32, student_id: i32) -> Result<bool, AppError> {
        Ok(progress::Entity::find_by_id((course_id, student_id))
            .one(self.conn)
            .await?
            .is_some())
    }

    /// Allocations the student has not activated yet.
    pub async fn list_unenrolled(&self, student_id: i32) -> Result<Vec<UnenrolledCourse>, AppError> {
        let allocations = self.allocations_of(student_id, false).await?;
        if allocations.is_empty() {
            return Ok(Vec::new());
        }
        let courses = self.courses_of(&allocations).await?;

        let mut instructor_ids: Vec<i32> = allocations.iter().map(|a| a.instructor_id).collect();
        instructor_ids.sort_unstable();
        instructor_ids.dedup();
        let instructors: HashMap<i32, String> = user::Entity::find()
            .filter(user::Column::Id.is_in(instructor_ids))
            .all(self.conn)
            .await?
            .into_iter()
            .map(|u| (u.id, u.display_name))
            .collect();

        let now = Utc::now();
        Ok(allocations
            .into_iter()
            .filter_map(|a| {
                let course = courses.get(&a.course_id)?;
                Some(UnenrolledCourse {
                    course_id: a.course_id,
                    title: course.title.clone(),
                    instructor_name: instructors
                        .get(&a.instructor_id)
                        .cloned()
                        .unwrap_or_default(),
                    validity_end_date: a.validity_end_date,
                    status: AccessStatus::at(Some(a.validity_end_date), now),
                })
            })
            .collect())
    }

    /// Activated allocations with progress, rating link and total course duration.
    ///
    /// Progress applies the `percentage` rule to the batched progress rows.
    pub async fn list_enrolled(&self, student_id: i32) -> Result<Vec<EnrolledCourse>, AppError> {
        let allocations = self.allocations_of(student_id, true).await?;
        if allocations.is_empty() {
            return Ok(Vec::new());
        }
        let courses = self.courses_of(&allocations).await?;
        let course_ids: Vec<i32> = courses.keys().copied().collect();

        let watched: HashMap<i32, i32> = progress::Entity::find()
            .filter(progress::Column::StudentId.eq(student_id))
            .filter(progress::Column::CourseId.is_in(course_ids.clone()))
            .all(self.conn)
            .await?
            .into_iter()
            .map(|p| (p.course_id, p.watched_lectures))
            .collect();
        let durations = ContentService::new(self.conn).durations(&course_ids).await?;

        let now = Utc::now();
        Ok(allocations
            .into_iter()
            .filter_map(|a| {
                let course = courses.get(&a.course_id)?;
                let watched = watched.get(&a.course_id).copied().unwrap_or(0);
                Some(EnrolledCourse {
                    course_id: a.course_id,
                    title: course.title.clone(),
                    enrollment_date: a.enrollment_date,
                    validity_end_date: a.validity_end_date,
                    status: AccessStatus::at(Some(a.validity_end_date), now),
                    progress: completion_percentage(watched, course.total_videos),
                    rating_id: a.rating_id,
                    total_duration: durations.get(&a.course_id).copied().unwrap_or(0),
                })
            })
            .collect())
    }

    async fn allocations_of(
        &self,
        student_id: i32,
        enrolled: bool,
    ) -> Result<Vec<allocation::Model>, AppError> {
        Ok(allocation::Entity::find()
            .filter(allocation::Column::StudentId.eq(student_id))
            .filter(allocation::Column::IsEnrolled.eq(enrolled))
            .order_by_desc(allocation::Column::CreatedAt)
            .order_by_asc(allocation::Column::CourseId)
            .all(self.conn)
            .await?)
    }

    async fn courses_of(
        &self,
        allocations: &[allocation::Model],
    ) -> Result<HashMap<i32, course::Model>, AppError> {
        let ids: Vec<i32> = allocations.iter().map(|a| a.course_id).collect();
        Ok(course::Entity::find()
            .filter(course::Column::Id.is_in(ids))
            .all(self.conn)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect())
    }
}
