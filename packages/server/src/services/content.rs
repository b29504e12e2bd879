use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use common::CourseStatus;
use common::access::DEFAULT_VALIDITY_DAYS;
use common::progress::completion_percentage_floor;
use sea_orm::sea_query::{Expr, ExprTrait, LockType, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::info;

use crate::entity::{
    allocation, answer, completed_lecture, course, progress, question, quiz, section, sub_section,
    user,
};
use crate::error::AppError;
use crate::extractors::auth::AuthUser;

/// A course with its ordered sections and lectures.
pub struct CourseOutline {
    pub course: course::Model,
    pub sections: Vec<(section::Model, Vec<sub_section::Model>)>,
    pub total_duration: i64,
}

/// Resolver and editor for the Course → Section → SubSection hierarchy.
///
/// Every structural edit recomputes `course.total_videos` inside the same transaction.
pub struct ContentService<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait + TransactionTrait<Transaction = DatabaseTransaction>> ContentService<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn find_course(&self, id: i32) -> Result<course::Model, AppError> {
        find_course(self.conn, id).await
    }

    /// Resolve the course a lecture belongs to.
    pub async fn course_of_sub_section(
        &self,
        sub_section_id: i32,
    ) -> Result<(sub_section::Model, course::Model), AppError> {
        course_of_sub_section(self.conn, sub_section_id).await
    }

    /// Total lecture duration in seconds per course. Courses without lectures map to 0.
    ///
    /// Two batched queries regardless of how many courses are asked for.
    pub async fn durations(&self, course_ids: &[i32]) -> Result<HashMap<i32, i64>, AppError> {
        let mut totals: HashMap<i32, i64> = course_ids.iter().map(|&id| (id, 0)).collect();
        if course_ids.is_empty() {
            return Ok(totals);
        }

        let sections: Vec<(i32, i32)> = section::Entity::find()
            .filter(section::Column::CourseId.is_in(course_ids.to_vec()))
            .select_only()
            .column(section::Column::Id)
            .column(section::Column::CourseId)
            .into_tuple()
            .all(self.conn)
            .await?;
        if sections.is_empty() {
            return Ok(totals);
        }
        let section_course: HashMap<i32, i32> = sections.into_iter().collect();

        let per_section: Vec<(i32, Option<i64>)> = sub_section::Entity::find()
            .filter(sub_section::Column::SectionId.is_in(section_course.keys().copied()))
            .select_only()
            .column(sub_section::Column::SectionId)
            .column_as(Expr::col(sub_section::Column::TimeDuration).sum(), "total")
            .group_by(sub_section::Column::SectionId)
            .into_tuple()
            .all(self.conn)
            .await?;

        for (section_id, total) in per_section {
            if let Some(course_id) = section_course.get(&section_id) {
                *totals.entry(*course_id).or_default() += total.unwrap_or(0);
            }
        }
        Ok(totals)
    }

    pub async fn outline(&self, course_id: i32) -> Result<CourseOutline, AppError> {
        let course = self.find_course(course_id).await?;

        let sections = section::Entity::find()
            .filter(section::Column::CourseId.eq(course_id))
            .order_by_asc(section::Column::Position)
            .order_by_asc(section::Column::Id)
            .all(self.conn)
            .await?;
        let section_ids: Vec<i32> = sections.iter().map(|s| s.id).collect();

        let mut lectures: BTreeMap<i32, Vec<sub_section::Model>> = BTreeMap::new();
        if !section_ids.is_empty() {
            let rows = sub_section::Entity::find()
                .filter(sub_section::Column::SectionId.is_in(section_ids))
                .order_by_asc(sub_section::Column::Position)
                .order_by_asc(sub_section::Column::Id)
                .all(self.conn)
                .await?;
            for row in rows {
                lectures.entry(row.section_id).or_default().push(row);
            }
        }

        let total_duration = lectures
            .values()
            .flatten()
            .map(|s| i64::from(s.time_duration))
            .sum();
        let sections = sections
            .into_iter()
            .map(|s| {
                let subs = lectures.remove(&s.id).unwrap_or_default();
                (s, subs)
            })
            .collect();

        Ok(CourseOutline {
            course,
            sections,
            total_duration,
        })
    }

    /// Owner, admin, or a student holding an allocation may read the outline.
    pub async fn check_outline_access(
        &self,
        auth_user: &AuthUser,
        course: &course::Model,
    ) -> Result<(), AppError> {
        if auth_user.is_admin() || course.instructor_id == auth_user.user_id {
            return Ok(());
        }
        let allocated = allocation::Entity::find_by_id((course.id, auth_user.user_id))
            .one(self.conn)
            .await?
            .is_some();
        if allocated {
            return Ok(());
        }
        Err(AppError::NotFound("Course not found".into()))
    }

    pub async fn create_course(
        &self,
        instructor_id: i32,
        title: &str,
        department_id: Option<i32>,
        validity_duration: Option<i32>,
    ) -> Result<course::Model, AppError> {
        let instructor = user::Entity::find_by_id(instructor_id)
            .one(self.conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Instructor not found".into()))?;

        let now = Utc::now();
        let model = course::ActiveModel {
            title: Set(title.trim().to_string()),
            instructor_id: Set(instructor_id),
            institute_id: Set(instructor.institute_id),
            department_id: Set(department_id.or(instructor.department_id)),
            approved: Set(false),
            status: Set(CourseStatus::Draft),
            validity_duration: Set(validity_duration.unwrap_or(DEFAULT_VALIDITY_DAYS)),
            total_videos: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(self.conn)
        .await?;

        info!(course_id = model.id, instructor_id, "Course created");
        Ok(model)
    }

    pub async fn review_course(
        &self,
        course_id: i32,
        approved: bool,
    ) -> Result<course::Model, AppError> {
        let txn = self.conn.begin().await?;
        let existing = find_course_for_update(&txn, course_id).await?;
        let mut active: course::ActiveModel = existing.into();
        active.approved = Set(approved);
        active.updated_at = Set(Utc::now());
        let model = active.update(&txn).await?;
        txn.commit().await?;

        info!(course_id, approved, "Course reviewed");
        Ok(model)
    }

    pub async fn publish_course(
        &self,
        auth_user: &AuthUser,
        course_id: i32,
    ) -> Result<course::Model, AppError> {
        let txn = self.conn.begin().await?;
        let existing = find_course_for_update(&txn, course_id).await?;
        ensure_course_owner(auth_user, &existing)?;
        if existing.status == CourseStatus::Published {
            return Err(AppError::Conflict("Course is already published".into()));
        }
        let mut active: course::ActiveModel = existing.into();
        active.status = Set(CourseStatus::Published);
        active.updated_at = Set(Utc::now());
        let model = active.update(&txn).await?;
        txn.commit().await?;

        info!(course_id, "Course published");
        Ok(model)
    }

    pub async fn add_section(
        &self,
        auth_user: &AuthUser,
        course_id: i32,
        title: &str,
    ) -> Result<section::Model, AppError> {
        let txn = self.conn.begin().await?;
        let course = find_course_for_update(&txn, course_id).await?;
        ensure_course_owner(auth_user, &course)?;

        let position = section::Entity::find()
            .filter(section::Column::CourseId.eq(course_id))
            .count(&txn)
            .await?;
        let model = section::ActiveModel {
            course_id: Set(course_id),
            title: Set(title.trim().to_string()),
            position: Set(position_from_count(position)?),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        refresh_total_videos(&txn, course_id).await?;
        txn.commit().await?;
        Ok(model)
    }

    pub async fn add_sub_section(
        &self,
        auth_user: &AuthUser,
        section_id: i32,
        title: &str,
        time_duration: i32,
        video_url: &str,
    ) -> Result<sub_section::Model, AppError> {
        let parent = section::Entity::find_by_id(section_id)
            .one(self.conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Section not found".into()))?;

        let txn = self.conn.begin().await?;
        let course = find_course_for_update(&txn, parent.course_id).await?;
        ensure_course_owner(auth_user, &course)?;

        let position = sub_section::Entity::find()
            .filter(sub_section::Column::SectionId.eq(section_id))
            .count(&txn)
            .await?;
        let model = sub_section::ActiveModel {
            section_id: Set(section_id),
            title: Set(title.trim().to_string()),
            time_duration: Set(time_duration),
            video_url: Set(video_url.trim().to_string()),
            position: Set(position_from_count(position)?),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let total = refresh_total_videos(&txn, course.id).await?;
        txn.commit().await?;

        info!(
            course_id = course.id,
            sub_section_id = model.id,
            total_videos = total,
            "Lecture added"
        );
        Ok(model)
    }

    /// Delete one lecture together with its quiz, answers and completion records.
    ///
    /// Students who had completed the lecture lose one watched lecture so the counter keeps
    /// matching their completion set.
    pub async fn delete_sub_section(
        &self,
        auth_user: &AuthUser,
        sub_section_id: i32,
    ) -> Result<(), AppError> {
        let (_, course) = self.course_of_sub_section(sub_section_id).await?;

        let txn = self.conn.begin().await?;
        let course = find_course_for_update(&txn, course.id).await?;
        ensure_course_owner(auth_user, &course)?;

        delete_quiz_rows(&txn, &[sub_section_id]).await?;

        let affected: Vec<i32> = completed_lecture::Entity::find()
            .filter(completed_lecture::Column::CourseId.eq(course.id))
            .filter(completed_lecture::Column::SubSectionId.eq(sub_section_id))
            .select_only()
            .column(completed_lecture::Column::StudentId)
            .into_tuple()
            .all(&txn)
            .await?;
        completed_lecture::Entity::delete_many()
            .filter(completed_lecture::Column::SubSectionId.eq(sub_section_id))
            .exec(&txn)
            .await?;
        if !affected.is_empty() {
            progress::Entity::update_many()
                .col_expr(
                    progress::Column::WatchedLectures,
                    Expr::col(progress::Column::WatchedLectures).sub(1),
                )
                .filter(progress::Column::CourseId.eq(course.id))
                .filter(progress::Column::StudentId.is_in(affected.clone()))
                .exec(&txn)
                .await?;
        }

        sub_section::Entity::delete_by_id(sub_section_id)
            .exec(&txn)
            .await?;
        let total = refresh_total_videos(&txn, course.id).await?;
        refresh_progress_cache(&txn, course.id, total).await?;
        txn.commit().await?;

        info!(
            course_id = course.id,
            sub_section_id,
            students_affected = affected.len(),
            "Lecture deleted"
        );
        Ok(())
    }

    /// Delete a course and everything hanging off it in one transaction.
    pub async fn delete_course(&self, auth_user: &AuthUser, course_id: i32) -> Result<(), AppError> {
        let txn = self.conn.begin().await?;
        let course = find_course_for_update(&txn, course_id).await?;
        ensure_course_owner(auth_user, &course)?;

        let section_ids: Vec<i32> = section::Entity::find()
            .filter(section::Column::CourseId.eq(course_id))
            .select_only()
            .column(section::Column::Id)
            .into_tuple()
            .all(&txn)
            .await?;
        let sub_section_ids: Vec<i32> = if section_ids.is_empty() {
            Vec::new()
        } else {
            sub_section::Entity::find()
                .filter(sub_section::Column::SectionId.is_in(section_ids.clone()))
                .select_only()
                .column(sub_section::Column::Id)
                .into_tuple()
                .all(&txn)
                .await?
        };

        delete_quiz_rows(&txn, &sub_section_ids).await?;
        // Allocations go first: enrollment holds the allocation row lock while it creates
        // progress, so this waits for it and the progress delete below sees its row.
        let allocations = allocation::Entity::delete_many()
            .filter(allocation::Column::CourseId.eq(course_id))
            .exec(&txn)
            .await?;
        completed_lecture::Entity::delete_many()
            .filter(completed_lecture::Column::CourseId.eq(course_id))
            .exec(&txn)
            .await?;
        progress::Entity::delete_many()
            .filter(progress::Column::CourseId.eq(course_id))
            .exec(&txn)
            .await?;
        if !section_ids.is_empty() {
            sub_section::Entity::delete_many()
                .filter(sub_section::Column::SectionId.is_in(section_ids))
                .exec(&txn)
                .await?;
        }
        section::Entity::delete_many()
            .filter(section::Column::CourseId.eq(course_id))
            .exec(&txn)
            .await?;
        course::Entity::delete_by_id(course_id).exec(&txn).await?;

        txn.commit().await?;

        info!(
            course_id,
            lectures = sub_section_ids.len(),
            allocations = allocations.rows_affected,
            "Course deleted"
        );
        Ok(())
    }
}

/// Owners and administrators may edit a course.
pub fn ensure_course_owner(auth_user: &AuthUser, course: &course::Model) -> Result<(), AppError> {
    if auth_user.is_admin() || course.instructor_id == auth_user.user_id {
        Ok(())
    } else {
        Err(AppError::PermissionDenied)
    }
}

pub async fn find_course<C: ConnectionTrait>(db: &C, id: i32) -> Result<course::Model, AppError> {
    course::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".into()))
}

pub async fn find_course_for_update(
    txn: &DatabaseTransaction,
    id: i32,
) -> Result<course::Model, AppError> {
    course::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".into()))
}

pub async fn course_of_sub_section<C: ConnectionTrait>(
    db: &C,
    sub_section_id: i32,
) -> Result<(sub_section::Model, course::Model), AppError> {
    let lecture = sub_section::Entity::find_by_id(sub_section_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Sub-section not found".into()))?;
    let parent = section::Entity::find_by_id(lecture.section_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Sub-section not found".into()))?;
    let course = find_course(db, parent.course_id).await?;
    Ok((lecture, course))
}

pub async fn count_videos<C: ConnectionTrait>(db: &C, course_id: i32) -> Result<i32, AppError> {
    let count = sub_section::Entity::find()
        .filter(
            sub_section::Column::SectionId.in_subquery(
                Query::select()
                    .column(section::Column::Id)
                    .from(section::Entity)
                    .and_where(section::Column::CourseId.eq(course_id))
                    .to_owned(),
            ),
        )
        .count(db)
        .await?;
    i32::try_from(count).map_err(|_| AppError::Internal("Lecture count overflow".into()))
}

/// Recompute the denormalized lecture count of a course. Returns the new count.
async fn refresh_total_videos(txn: &DatabaseTransaction, course_id: i32) -> Result<i32, AppError> {
    let total = count_videos(txn, course_id).await?;
    course::Entity::update_many()
        .col_expr(course::Column::TotalVideos, Expr::value(total))
        .col_expr(course::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(course::Column::Id.eq(course_id))
        .exec(txn)
        .await?;
    Ok(total)
}

/// Rewrite the integer progress cache on every allocation of a course after its lecture
/// count changed. One update per distinct percentage value.
async fn refresh_progress_cache(
    txn: &DatabaseTransaction,
    course_id: i32,
    total_videos: i32,
) -> Result<(), AppError> {
    let rows: Vec<(i32, i32)> = progress::Entity::find()
        .filter(progress::Column::CourseId.eq(course_id))
        .select_only()
        .column(progress::Column::StudentId)
        .column(progress::Column::WatchedLectures)
        .into_tuple()
        .all(txn)
        .await?;

    let mut by_value: BTreeMap<i32, Vec<i32>> = BTreeMap::new();
    for (student_id, watched) in rows {
        by_value
            .entry(completion_percentage_floor(watched, total_videos))
            .or_default()
            .push(student_id);
    }
    for (value, students) in by_value {
        allocation::Entity::update_many()
            .col_expr(allocation::Column::Progress, Expr::value(value))
            .filter(allocation::Column::CourseId.eq(course_id))
            .filter(allocation::Column::StudentId.is_in(students))
            .exec(txn)
            .await?;
    }
    Ok(())
}

/// Remove quizzes, their questions and every answer submitted against the given lectures.
pub async fn delete_quiz_rows(
    txn: &DatabaseTransaction,
    sub_section_ids: &[i32],
) -> Result<u64, AppError> {
    if sub_section_ids.is_empty() {
        return Ok(0);
    }
    let quiz_ids: HashSet<i32> = quiz::Entity::find()
        .filter(quiz::Column::SubSectionId.is_in(sub_section_ids.to_vec()))
        .select_only()
        .column(quiz::Column::Id)
        .into_tuple::<i32>()
        .all(txn)
        .await?
        .into_iter()
        .collect();

    answer::Entity::delete_many()
        .filter(answer::Column::SubSectionId.is_in(sub_section_ids.to_vec()))
        .exec(txn)
        .await?;
    if quiz_ids.is_empty() {
        return Ok(0);
    }
    question::Entity::delete_many()
        .filter(question::Column::QuizId.is_in(quiz_ids.iter().copied()))
        .exec(txn)
        .await?;
    let deleted = quiz::Entity::delete_many()
        .filter(quiz::Column::Id.is_in(quiz_ids))
        .exec(txn)
        .await?;
    Ok(deleted.rows_affected)
}

fn position_from_count(count: u64) -> Result<i32, AppError> {
    i32::try_from(count).map_err(|_| AppError::Validation("Too many children".into()))
}
