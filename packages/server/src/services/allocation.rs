use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use common::access::validity_end;
use common::progress::completion_percentage;
use common::{AccessStatus, Role};
use futures::{StreamExt, stream};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr,
};
use tracing::{info, warn};

use crate::entity::{allocation, course, progress, user};
use crate::error::AppError;
use crate::models::allocation::{
    AllocatedCourse, AllocatedStudent, AllocationFailure, FailedAllocation, GrantedAllocation,
};
use crate::services::content::find_course;

/// Settled result of a batch allocation, in request order.
pub struct AllocationOutcome {
    pub granted: Vec<GrantedAllocation>,
    pub failed: Vec<FailedAllocation>,
}

enum StudentResult {
    Granted(GrantedAllocation),
    Failed(FailedAllocation),
}

pub struct AllocationService<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> AllocationService<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Grant a course to a batch of students.
    ///
    /// Course-level preconditions fail the whole call before any write. Past that point
    /// every distinct student is attempted independently: the composite key decides
    /// duplicates and one failure never affects the others. An id repeated in the request
    /// is reported as already allocated after its first occurrence.
    pub async fn allocate(
        &self,
        instructor_id: i32,
        course_id: i32,
        student_ids: &[i32],
        concurrency: usize,
    ) -> Result<AllocationOutcome, AppError> {
        let course = find_course(self.conn, course_id).await?;
        if course.instructor_id != instructor_id {
            return Err(AppError::PermissionDenied);
        }
        if !course.approved {
            return Err(AppError::CourseNotApproved);
        }

        let students: HashMap<i32, user::Model> = user::Entity::find()
            .filter(user::Column::Id.is_in(student_ids.to_vec()))
            .filter(user::Column::Role.eq(Role::Student))
            .all(self.conn)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        // Repeats of an id within the request never reach the store.
        let mut seen = HashSet::new();
        let attempts: Vec<(i32, bool)> = student_ids
            .iter()
            .map(|&student_id| (student_id, !seen.insert(student_id)))
            .collect();

        let now = Utc::now();
        let (course, students) = (&course, &students);
        let results: Vec<StudentResult> = stream::iter(attempts)
            .map(|(student_id, repeated)| async move {
                if repeated {
                    let reason = if students.contains_key(&student_id) {
                        AllocationFailure::AlreadyAllocated
                    } else {
                        AllocationFailure::StudentNotFound
                    };
                    return StudentResult::Failed(FailedAllocation { student_id, reason });
                }
                self.allocate_one(course, students.get(&student_id), student_id, now)
                    .await
            })
            .buffered(concurrency.max(1))
            .collect()
            .await;

        let mut granted = Vec::new();
        let mut failed = Vec::new();
        for result in results {
            match result {
                StudentResult::Granted(g) => granted.push(g),
                StudentResult::Failed(f) => failed.push(f),
            }
        }

        info!(
            course_id,
            instructor_id,
            granted = granted.len(),
            failed = failed.len(),
            "Allocation batch processed"
        );

        Ok(AllocationOutcome { granted, failed })
    }

    async fn allocate_one(
        &self,
        course: &course::Model,
        student: Option<&user::Model>,
        student_id: i32,
        now: DateTime<Utc>,
    ) -> StudentResult {
        let Some(student) = student else {
            return StudentResult::Failed(FailedAllocation {
                student_id,
                reason: AllocationFailure::StudentNotFound,
            });
        };

        let validity_end_date = validity_end(now, course.validity_duration);
        let model = allocation::ActiveModel {
            course_id: Set(course.id),
            student_id: Set(student_id),
            instructor_id: Set(course.instructor_id),
            institute_id: Set(course.institute_id),
            department_id: Set(course.department_id),
            is_enrolled: Set(false),
            enrollment_date: Set(None),
            validity_end_date: Set(validity_end_date),
            progress: Set(0),
            last_accessed: Set(None),
            rating_id: Set(None),
            created_at: Set(now),
            ..Default::default()
        };

        match model.insert(self.conn).await {
            Ok(_) => StudentResult::Granted(GrantedAllocation {
                student_id,
                username: student.username.clone(),
                display_name: student.display_name.clone(),
                email: student.email.clone(),
                validity_end_date,
            }),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                StudentResult::Failed(FailedAllocation {
                    student_id,
                    reason: AllocationFailure::AlreadyAllocated,
                })
            }
            Err(e) => {
                warn!(
                    course_id = course.id,
                    student_id,
                    error = %e,
                    "Allocation insert failed"
                );
                StudentResult::Failed(FailedAllocation {
                    student_id,
                    reason: AllocationFailure::PersistenceError,
                })
            }
        }
    }

    /// Courses of an instructor that have at least one allocation, with their students.
    ///
    /// Four queries in total, independent of the number of rows.
    pub async fn list_for_instructor(
        &self,
        instructor_id: i32,
    ) -> Result<Vec<AllocatedCourse>, AppError> {
        let allocations = allocation::Entity::find()
            .filter(allocation::Column::InstructorId.eq(instructor_id))
            .order_by_asc(allocation::Column::CourseId)
            .order_by_asc(allocation::Column::CreatedAt)
            .order_by_asc(allocation::Column::StudentId)
            .all(self.conn)
            .await?;
        if allocations.is_empty() {
            return Ok(Vec::new());
        }

        let mut course_ids: Vec<i32> = allocations.iter().map(|a| a.course_id).collect();
        course_ids.dedup();
        let mut student_ids: Vec<i32> = allocations.iter().map(|a| a.student_id).collect();
        student_ids.sort_unstable();
        student_ids.dedup();

        let courses: HashMap<i32, course::Model> = course::Entity::find()
            .filter(course::Column::Id.is_in(course_ids.clone()))
            .all(self.conn)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        let students: HashMap<i32, user::Model> = user::Entity::find()
            .filter(user::Column::Id.is_in(student_ids.clone()))
            .all(self.conn)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();
        let watched: HashMap<(i32, i32), i32> = progress::Entity::find()
            .filter(progress::Column::CourseId.is_in(course_ids))
            .filter(progress::Column::StudentId.is_in(student_ids))
            .all(self.conn)
            .await?
            .into_iter()
            .map(|p| ((p.course_id, p.student_id), p.watched_lectures))
            .collect();

        let now = Utc::now();
        let mut grouped: BTreeMap<i32, AllocatedCourse> = BTreeMap::new();
        for a in allocations {
            let Some(course) = courses.get(&a.course_id) else {
                continue;
            };
            let Some(student) = students.get(&a.student_id) else {
                continue;
            };
            let progress = watched
                .get(&(a.course_id, a.student_id))
                .map(|&w| completion_percentage(w, course.total_videos))
                .unwrap_or(0.0);

            grouped
                .entry(a.course_id)
                .or_insert_with(|| AllocatedCourse {
                    course_id: course.id,
                    title: course.title.clone(),
                    students: Vec::new(),
                })
                .students
                .push(AllocatedStudent {
                    student_id: a.student_id,
                    username: student.username.clone(),
                    display_name: student.display_name.clone(),
                    email: student.email.clone(),
                    is_enrolled: a.is_enrolled,
                    enrollment_date: a.enrollment_date,
                    validity_end_date: a.validity_end_date,
                    status: AccessStatus::at(Some(a.validity_end_date), now),
                    progress,
                });
        }

        Ok(grouped.into_values().collect())
    }
}
