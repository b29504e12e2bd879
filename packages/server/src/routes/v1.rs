use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/instructor", instructor_routes())
        .nest("/student", student_routes())
        .nest("/course", course_routes())
        .nest("/quiz", quiz_routes())
}

fn instructor_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::allocation::allocate_course))
        .routes(routes!(handlers::allocation::list_allocations))
}

fn student_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::enrollment::list_unenrolled))
        .routes(routes!(handlers::enrollment::enroll))
        .routes(routes!(handlers::enrollment::list_enrolled))
}

fn course_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::course::create_course))
        .routes(routes!(
            handlers::course::get_course,
            handlers::course::delete_course
        ))
        .routes(routes!(handlers::course::review_course))
        .routes(routes!(handlers::course::publish_course))
        .routes(routes!(handlers::course::add_section))
        .routes(routes!(handlers::course::add_sub_section))
        .routes(routes!(handlers::course::delete_sub_section))
        .routes(routes!(handlers::enrollment::mark_complete))
        .routes(routes!(handlers::enrollment::get_progress))
}

fn quiz_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::quiz::create_quiz))
        .routes(routes!(handlers::quiz::submit_quiz))
        .routes(routes!(
            handlers::quiz::get_quiz,
            handlers::quiz::delete_quiz
        ))
        .routes(routes!(handlers::quiz::get_graded_results))
}
