use sqlx::SqlitePool;
use tracing::info;

use crate::config::Config;
use crate::error::ApiError;
use crate::model::role::Role;
use crate::service::course::{NewCourse, create_course};
use crate::service::user::{NewUser, create_user, find_by_email};
use crate::utils::email_index::EmailIndex;

const MANDATORY: &str = "Mandatory";

const DEFAULT_COURSES: [(&str, &str); 3] = [
    (
        "Workplace Health and Safety",
        "Hazard reporting, emergency procedures and safe work practices.",
    ),
    (
        "Privacy and Data Protection",
        "Handling personal and employee information lawfully.",
    ),
    ("Code of Conduct", "Expected behaviour, conflicts of interest and reporting channels."),
];

/// First-run data: the configured admin account and the mandatory courses.
/// Safe to call on every start.
pub async fn seed_database(pool: &SqlitePool, index: &EmailIndex, config: &Config) -> Result<(), ApiError> {
    seed_admin(pool, index, config).await?;
    seed_courses(pool).await
}

async fn seed_admin(pool: &SqlitePool, index: &EmailIndex, config: &Config) -> Result<(), ApiError> {
    if find_by_email(pool, &config.admin_email).await?.is_some() {
        info!("Admin user already exists");
        return Ok(());
    }

    let admin = create_user(
        pool,
        index,
        NewUser {
            name: "Test Admin".into(),
            email: config.admin_email.clone(),
            phone: Some("9999999999".into()),
            department: Some("HR".into()),
            role: Role::Admin,
            password: config.admin_password.clone(),
        },
    )
    .await?;

    info!(employee_id = %admin.employee_id, "Admin user created");
    Ok(())
}

async fn seed_courses(pool: &SqlitePool) -> Result<(), ApiError> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM courses").fetch_one(pool).await?;
    if existing > 0 {
        return Ok(());
    }

    for (name, description) in DEFAULT_COURSES {
        create_course(
            pool,
            NewCourse {
                name: name.into(),
                course_type: MANDATORY.into(),
                description: Some(description.into()),
                ..Default::default()
            },
        )
        .await?;
    }

    info!(count = DEFAULT_COURSES.len(), "Default courses inserted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    #[actix_web::test]
    async fn seeding_twice_is_a_no_op() {
        let pool = init_db("sqlite::memory:").await.unwrap();
        let index = EmailIndex::default();
        let config = Config::for_testing();

        seed_database(&pool, &index, &config).await.unwrap();
        seed_database(&pool, &index, &config).await.unwrap();

        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&pool).await.unwrap();
        let courses: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM courses").fetch_one(&pool).await.unwrap();
        assert_eq!((users, courses), (1, 3));

        let admin = find_by_email(&pool, &config.admin_email).await.unwrap().unwrap();
        assert_eq!(admin.employee_id, "EMP0001");
        assert_eq!(admin.role(), Some(Role::Admin));
    }
}
