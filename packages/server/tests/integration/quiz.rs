use ::common::Role;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::{Value, json};

use crate::common::{TestApp, TestCourse, TestUser, routes};
use coursework_server::entity::{answer, question, quiz};

/// Instructor, admin, an enrolled student and an approved two-lecture course.
struct Classroom {
    instructor: TestUser,
    admin: TestUser,
    student: TestUser,
    course: TestCourse,
}

async fn classroom(app: &TestApp) -> Classroom {
    let admin = app.create_user("admin", Role::Admin).await;
    let instructor = app.create_user("prof", Role::Instructor).await;
    let student = app.create_user("alice", Role::Student).await;
    let course = app.approved_course(&instructor.token, &admin.token, 2).await;
    app.allocate_and_enroll(course.id, &student, &instructor.token)
        .await;
    Classroom {
        instructor,
        admin,
        student,
        course,
    }
}

fn answers_body(sub_section_id: i32, answers: &[(i32, &str)]) -> Value {
    let map: serde_json::Map<String, Value> = answers
        .iter()
        .map(|(id, text)| (id.to_string(), json!(text)))
        .collect();
    json!({ "subSectionId": sub_section_id, "answers": map })
}

async fn stored_answers(app: &TestApp, student_id: i32, sub_section_id: i32) -> Vec<answer::Model> {
    answer::Entity::find()
        .filter(answer::Column::StudentId.eq(student_id))
        .filter(answer::Column::SubSectionId.eq(sub_section_id))
        .all(&app.db)
        .await
        .unwrap()
}

mod create {
    use super::*;

    #[tokio::test]
    async fn stores_questions_in_serial_order() {
        let app = TestApp::spawn().await;
        let c = classroom(&app).await;
        let lecture = c.course.lectures[0];

        let quiz_id = app
            .create_quiz(lecture, &c.instructor.token, &["A", "B", "C"])
            .await;

        let rows = question::Entity::find()
            .filter(question::Column::QuizId.eq(quiz_id))
            .all(&app.db)
            .await
            .unwrap();
        let mut serials: Vec<i32> = rows.iter().map(|q| q.serial).collect();
        serials.sort_unstable();
        assert_eq!(serials, vec![1, 2, 3]);

        let res = app
            .get_with_token(&routes::quiz(lecture), &c.instructor.token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["quizId"], quiz_id);
        assert_eq!(res.body["title"], "Checkpoint");
        assert_eq!(res.body["questions"][1]["serial"], 2);
        assert_eq!(res.body["questions"][1]["correctAnswer"], "B");
        assert_eq!(res.body["questions"][1]["options"], json!(["A", "B", "C", "D"]));
    }

    #[tokio::test]
    async fn rejects_answer_outside_options_without_persisting() {
        let app = TestApp::spawn().await;
        let c = classroom(&app).await;

        let res = app
            .post_with_token(
                routes::QUIZ_CREATE,
                &json!({
                    "subsectionId": c.course.lectures[0],
                    "title": "Checkpoint",
                    "description": "Quick check",
                    "questions": [
                        { "prompt": "One", "options": ["A", "B", "C", "D"], "correctAnswer": "A" },
                        { "prompt": "Two", "options": ["A", "B", "C", "D"], "correctAnswer": "E" },
                    ],
                }),
                &c.instructor.token,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert!(
            res.body["message"].as_str().unwrap().contains("Question 2"),
            "{}",
            res.text
        );
        assert_eq!(quiz::Entity::find().count(&app.db).await.unwrap(), 0);
        assert_eq!(question::Entity::find().count(&app.db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rejects_second_quiz_for_same_lecture() {
        let app = TestApp::spawn().await;
        let c = classroom(&app).await;
        let lecture = c.course.lectures[0];
        app.create_quiz(lecture, &c.instructor.token, &["A"]).await;

        let res = app
            .post_with_token(
                routes::QUIZ_CREATE,
                &json!({
                    "subsectionId": lecture,
                    "title": "Again",
                    "description": "Duplicate",
                    "questions": [
                        { "prompt": "One", "options": ["A", "B", "C", "D"], "correctAnswer": "B" },
                    ],
                }),
                &c.instructor.token,
            )
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn only_course_owner_can_create() {
        let app = TestApp::spawn().await;
        let c = classroom(&app).await;
        let other = app.create_user("other", Role::Instructor).await;

        let body = json!({
            "subsectionId": c.course.lectures[0],
            "title": "Checkpoint",
            "description": "Quick check",
            "questions": [
                { "prompt": "One", "options": ["A", "B", "C", "D"], "correctAnswer": "A" },
            ],
        });

        let res = app
            .post_with_token(routes::QUIZ_CREATE, &body, &other.token)
            .await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");

        let res = app
            .post_with_token(routes::QUIZ_CREATE, &body, &c.student.token)
            .await;
        assert_eq!(res.status, 403);

        let res = app
            .post_with_token(routes::QUIZ_CREATE, &body, &c.admin.token)
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
    }

    #[tokio::test]
    async fn unknown_lecture_is_not_found() {
        let app = TestApp::spawn().await;
        let c = classroom(&app).await;

        let res = app
            .post_with_token(
                routes::QUIZ_CREATE,
                &json!({
                    "subsectionId": 424_242,
                    "title": "Checkpoint",
                    "description": "Quick check",
                    "questions": [
                        { "prompt": "One", "options": ["A", "B", "C", "D"], "correctAnswer": "A" },
                    ],
                }),
                &c.instructor.token,
            )
            .await;

        assert_eq!(res.status, 404);
    }
}

mod view {
    use super::*;

    #[tokio::test]
    async fn enrolled_student_does_not_see_answer_key() {
        let app = TestApp::spawn().await;
        let c = classroom(&app).await;
        let lecture = c.course.lectures[0];
        app.create_quiz(lecture, &c.instructor.token, &["A", "B"])
            .await;

        let res = app
            .get_with_token(&routes::quiz(lecture), &c.student.token)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        let questions = res.body["questions"].as_array().unwrap();
        assert_eq!(questions.len(), 2);
        for q in questions {
            assert!(q.get("correctAnswer").is_none(), "{}", res.text);
            assert_eq!(q["options"].as_array().map(Vec::len), Some(4));
        }
    }

    #[tokio::test]
    async fn outsiders_get_not_found() {
        let app = TestApp::spawn().await;
        let c = classroom(&app).await;
        let lecture = c.course.lectures[0];
        app.create_quiz(lecture, &c.instructor.token, &["A"]).await;
        let stranger = app.create_user("mallory", Role::Student).await;
        let other = app.create_user("other", Role::Instructor).await;

        let res = app
            .get_with_token(&routes::quiz(lecture), &stranger.token)
            .await;
        assert_eq!(res.status, 404);

        let res = app.get_with_token(&routes::quiz(lecture), &other.token).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn admin_sees_answer_key() {
        let app = TestApp::spawn().await;
        let c = classroom(&app).await;
        let lecture = c.course.lectures[0];
        app.create_quiz(lecture, &c.instructor.token, &["D"]).await;

        let res = app.get_with_token(&routes::quiz(lecture), &c.admin.token).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["questions"][0]["correctAnswer"], "D");
    }
}

mod submit {
    use super::*;

    #[tokio::test]
    async fn resubmission_replaces_previous_answers() {
        let app = TestApp::spawn().await;
        let c = classroom(&app).await;
        let lecture = c.course.lectures[0];
        app.create_quiz(lecture, &c.instructor.token, &["A", "B", "C"])
            .await;
        let ids = app.question_ids(lecture, &c.instructor.token).await;

        let res = app
            .post_with_token(
                routes::QUIZ_SUBMIT,
                &answers_body(lecture, &[(ids[0], "B")]),
                &c.student.token,
            )
            .await;
        assert_eq!(res.status, 204, "{}", res.text);

        let res = app
            .post_with_token(
                routes::QUIZ_SUBMIT,
                &answers_body(lecture, &[(ids[1], "C")]),
                &c.student.token,
            )
            .await;
        assert_eq!(res.status, 204, "{}", res.text);

        let rows = stored_answers(&app, c.student.id, lecture).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].question_id, ids[1]);
        assert_eq!(rows[0].answer, "C");
    }

    #[tokio::test]
    async fn foreign_question_id_rejects_whole_submission() {
        let app = TestApp::spawn().await;
        let c = classroom(&app).await;
        let first = c.course.lectures[0];
        let second = c.course.lectures[1];
        app.create_quiz(first, &c.instructor.token, &["A"]).await;
        app.create_quiz(second, &c.instructor.token, &["B"]).await;
        let first_ids = app.question_ids(first, &c.instructor.token).await;
        let second_ids = app.question_ids(second, &c.instructor.token).await;

        let res = app
            .post_with_token(
                routes::QUIZ_SUBMIT,
                &answers_body(first, &[(first_ids[0], "A")]),
                &c.student.token,
            )
            .await;
        assert_eq!(res.status, 204, "{}", res.text);

        let res = app
            .post_with_token(
                routes::QUIZ_SUBMIT,
                &answers_body(first, &[(first_ids[0], "B"), (second_ids[0], "B")]),
                &c.student.token,
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");

        let rows = stored_answers(&app, c.student.id, first).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].answer, "A");
    }

    #[tokio::test]
    async fn empty_answers_are_rejected() {
        let app = TestApp::spawn().await;
        let c = classroom(&app).await;
        let lecture = c.course.lectures[0];
        app.create_quiz(lecture, &c.instructor.token, &["A"]).await;

        let res = app
            .post_with_token(
                routes::QUIZ_SUBMIT,
                &json!({ "subSectionId": lecture, "answers": {} }),
                &c.student.token,
            )
            .await;

        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn lecture_without_quiz_is_not_found() {
        let app = TestApp::spawn().await;
        let c = classroom(&app).await;

        let res = app
            .post_with_token(
                routes::QUIZ_SUBMIT,
                &answers_body(c.course.lectures[0], &[(1, "A")]),
                &c.student.token,
            )
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn requires_enrollment() {
        let app = TestApp::spawn().await;
        let c = classroom(&app).await;
        let lecture = c.course.lectures[0];
        app.create_quiz(lecture, &c.instructor.token, &["A"]).await;
        let ids = app.question_ids(lecture, &c.instructor.token).await;
        let stranger = app.create_user("mallory", Role::Student).await;

        let res = app
            .post_with_token(
                routes::QUIZ_SUBMIT,
                &answers_body(lecture, &[(ids[0], "A")]),
                &stranger.token,
            )
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_ENROLLED");
    }

    #[tokio::test]
    async fn instructors_cannot_submit() {
        let app = TestApp::spawn().await;
        let c = classroom(&app).await;

        let res = app
            .post_with_token(
                routes::QUIZ_SUBMIT,
                &answers_body(c.course.lectures[0], &[(1, "A")]),
                &c.instructor.token,
            )
            .await;

        assert_eq!(res.status, 403);
    }
}

mod grading {
    use super::*;

    #[tokio::test]
    async fn trims_whitespace_and_scores_exact_matches() {
        let app = TestApp::spawn().await;
        let c = classroom(&app).await;
        let lecture = c.course.lectures[0];
        app.create_quiz(lecture, &c.instructor.token, &["A", "B", "C"])
            .await;
        let ids = app.question_ids(lecture, &c.instructor.token).await;

        let res = app
            .post_with_token(
                routes::QUIZ_SUBMIT,
                &answers_body(lecture, &[(ids[0], "A "), (ids[1], "x"), (ids[2], "C")]),
                &c.student.token,
            )
            .await;
        assert_eq!(res.status, 204, "{}", res.text);

        let res = app
            .get_with_token(&routes::graded(c.course.id), &c.student.token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        let result = &res.body[lecture.to_string()];
        assert_eq!(result["totalPoints"], 3);
        assert_eq!(result["scoredPoints"], 2);
        let correct: Vec<bool> = result["answers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["isCorrect"].as_bool().unwrap())
            .collect();
        assert_eq!(correct, vec![true, false, true]);
        assert_eq!(result["answers"][0]["answer"], "A ");
    }

    #[tokio::test]
    async fn unanswered_questions_count_toward_total() {
        let app = TestApp::spawn().await;
        let c = classroom(&app).await;
        let lecture = c.course.lectures[0];
        app.create_quiz(lecture, &c.instructor.token, &["A", "B"])
            .await;
        let ids = app.question_ids(lecture, &c.instructor.token).await;

        app.post_with_token(
            routes::QUIZ_SUBMIT,
            &answers_body(lecture, &[(ids[1], "B")]),
            &c.student.token,
        )
        .await;

        let res = app
            .get_with_token(&routes::graded(c.course.id), &c.student.token)
            .await;
        let result = &res.body[lecture.to_string()];
        assert_eq!(result["totalPoints"], 2);
        assert_eq!(result["scoredPoints"], 1);
        assert_eq!(result["answers"][0]["answer"], json!(null));
        assert_eq!(result["answers"][0]["isCorrect"], false);
    }

    #[tokio::test]
    async fn only_attempted_quizzes_are_reported() {
        let app = TestApp::spawn().await;
        let c = classroom(&app).await;
        let first = c.course.lectures[0];
        let second = c.course.lectures[1];
        app.create_quiz(first, &c.instructor.token, &["A"]).await;
        app.create_quiz(second, &c.instructor.token, &["B"]).await;

        let res = app
            .get_with_token(&routes::graded(c.course.id), &c.student.token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body, json!({}));

        let ids = app.question_ids(second, &c.instructor.token).await;
        app.post_with_token(
            routes::QUIZ_SUBMIT,
            &answers_body(second, &[(ids[0], "B")]),
            &c.student.token,
        )
        .await;

        let res = app
            .get_with_token(&routes::graded(c.course.id), &c.student.token)
            .await;
        let graded = res.body.as_object().unwrap();
        assert_eq!(graded.len(), 1);
        assert_eq!(graded[&second.to_string()]["scoredPoints"], 1);
    }

    #[tokio::test]
    async fn unknown_course_is_not_found() {
        let app = TestApp::spawn().await;
        let c = classroom(&app).await;

        let res = app
            .get_with_token(&routes::graded(999_999), &c.student.token)
            .await;

        assert_eq!(res.status, 404);
    }
}

mod delete {
    use super::*;

    #[tokio::test]
    async fn removes_questions_and_answers() {
        let app = TestApp::spawn().await;
        let c = classroom(&app).await;
        let lecture = c.course.lectures[0];
        app.create_quiz(lecture, &c.instructor.token, &["A", "B"])
            .await;
        let ids = app.question_ids(lecture, &c.instructor.token).await;
        app.post_with_token(
            routes::QUIZ_SUBMIT,
            &answers_body(lecture, &[(ids[0], "A")]),
            &c.student.token,
        )
        .await;

        let res = app
            .delete_with_token(&routes::quiz(lecture), &c.instructor.token)
            .await;
        assert_eq!(res.status, 204, "{}", res.text);

        assert_eq!(quiz::Entity::find().count(&app.db).await.unwrap(), 0);
        assert_eq!(question::Entity::find().count(&app.db).await.unwrap(), 0);
        assert!(stored_answers(&app, c.student.id, lecture).await.is_empty());

        let res = app
            .delete_with_token(&routes::quiz(lecture), &c.instructor.token)
            .await;
        assert_eq!(res.status, 404);

        let res = app
            .get_with_token(&routes::quiz(lecture), &c.instructor.token)
            .await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn only_course_owner_can_delete() {
        let app = TestApp::spawn().await;
        let c = classroom(&app).await;
        let lecture = c.course.lectures[0];
        app.create_quiz(lecture, &c.instructor.token, &["A"]).await;
        let other = app.create_user("other", Role::Instructor).await;

        let res = app
            .delete_with_token(&routes::quiz(lecture), &other.token)
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(quiz::Entity::find().count(&app.db).await.unwrap(), 1);
    }
}
