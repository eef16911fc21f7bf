use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::model::review::PerformanceReview;
use crate::service::user::get_user;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

#[instrument(skip(pool, comments))]
pub async fn create_review(
    pool: &SqlitePool,
    reviewer: &str,
    employee_id: &str,
    rating: i64,
    comments: &str,
) -> Result<i64, ApiError> {
    if employee_id == reviewer {
        return Err(ApiError::forbidden("You cannot review yourself"));
    }
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(ApiError::bad_request(format!(
            "Rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }
    get_user(pool, employee_id).await?;

    let id = sqlx::query("INSERT INTO performance_reviews (employee_id, rating, comments, reviewer_id) VALUES (?, ?, ?, ?)")
        .bind(employee_id)
        .bind(rating)
        .bind(comments)
        .bind(reviewer)
        .execute(pool)
        .await?
        .last_insert_rowid();

    info!(review_id = id, "Performance review recorded");
    Ok(id)
}

pub async fn reviews_for(pool: &SqlitePool, employee_id: &str) -> Result<Vec<PerformanceReview>, ApiError> {
    Ok(sqlx::query_as::<_, PerformanceReview>(
        r#"
        SELECT id, employee_id, rating, comments, reviewer_id, created_at
        FROM performance_reviews
        WHERE employee_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(employee_id)
    .fetch_all(pool)
    .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    #[actix_web::test]
    async fn review_rules() {
        let pool = init_db("sqlite::memory:").await.unwrap();
        sqlx::query("INSERT INTO users (employee_id, name, email, role, password_hash) VALUES ('EMP0002', 'Jane Doe', 'jane@example.com', 'Employee', 'x')")
            .execute(&pool)
            .await
            .unwrap();

        assert!(matches!(create_review(&pool, "EMP0002", "EMP0002", 5, "great").await, Err(ApiError::Forbidden(_))));
        assert!(matches!(create_review(&pool, "EMP0001", "EMP0002", 6, "great").await, Err(ApiError::BadRequest(_))));
        assert!(matches!(create_review(&pool, "EMP0001", "EMP0404", 3, "ok").await, Err(ApiError::NotFound(_))));

        create_review(&pool, "EMP0001", "EMP0002", 3, "steady").await.unwrap();
        create_review(&pool, "EMP0001", "EMP0002", 5, "excellent quarter").await.unwrap();

        let reviews = reviews_for(&pool, "EMP0002").await.unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].comments, "excellent quarter");
    }
}
