use std::time::Duration;

use sea_orm::sea_query::{Index, PostgresQueryBuilder};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::entity::{allocation, answer, completed_lecture, section, sub_section};

pub async fn init_db(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(config.url.to_owned());

    // Set connection pool options
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("coursework_server::entity::*")
        .sync(&db)
        .await?;

    Ok(db)
}

/// Ensure the lookup indexes the listing and grading queries rely on exist.
///
/// SeaORM's schema-sync doesn't support composite non-unique indexes,
/// so we create them manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    let statements = [
        (
            "idx_allocation_student_enrolled",
            Index::create()
                .if_not_exists()
                .name("idx_allocation_student_enrolled")
                .table(allocation::Entity)
                .col(allocation::Column::StudentId)
                .col(allocation::Column::IsEnrolled)
                .to_string(PostgresQueryBuilder),
        ),
        (
            "idx_allocation_instructor",
            Index::create()
                .if_not_exists()
                .name("idx_allocation_instructor")
                .table(allocation::Entity)
                .col(allocation::Column::InstructorId)
                .to_string(PostgresQueryBuilder),
        ),
        (
            "idx_section_course_position",
            Index::create()
                .if_not_exists()
                .name("idx_section_course_position")
                .table(section::Entity)
                .col(section::Column::CourseId)
                .col(section::Column::Position)
                .to_string(PostgresQueryBuilder),
        ),
        (
            "idx_sub_section_section_position",
            Index::create()
                .if_not_exists()
                .name("idx_sub_section_section_position")
                .table(sub_section::Entity)
                .col(sub_section::Column::SectionId)
                .col(sub_section::Column::Position)
                .to_string(PostgresQueryBuilder),
        ),
        (
            "idx_completed_lecture_sub_section",
            Index::create()
                .if_not_exists()
                .name("idx_completed_lecture_sub_section")
                .table(completed_lecture::Entity)
                .col(completed_lecture::Column::SubSectionId)
                .to_string(PostgresQueryBuilder),
        ),
        (
            "idx_answer_sub_section",
            Index::create()
                .if_not_exists()
                .name("idx_answer_sub_section")
                .table(answer::Entity)
                .col(answer::Column::SubSectionId)
                .to_string(PostgresQueryBuilder),
        ),
    ];

    for (name, stmt) in statements {
        match db.execute_unprepared(&stmt).await {
            Ok(_) => info!("Ensured index {name} exists"),
            Err(e) => warn!("Failed to create index {name}: {e}"),
        }
    }

    Ok(())
}
