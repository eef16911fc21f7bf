use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::model::course::{Course, CourseSubmission, SubmissionDetail, SubmissionStatus};
use crate::utils::dates::now;

const COURSE_COLUMNS: &str = "c.id, c.name, c.description, c.type, c.department, c.target_role, c.deadline, c.created_at";
const SUBMISSION_COLUMNS: &str = "s.id, s.employee_id, s.course_id, s.completion_notes, s.status, \
                                  s.reviewer_comment, s.reviewed_by, s.reviewed_at, s.submitted_at";

#[derive(Debug, Default)]
pub struct NewCourse {
    pub name: String,
    pub course_type: String,
    pub description: Option<String>,
    pub department: Option<String>,
    pub target_role: Option<String>,
    pub deadline: Option<NaiveDate>,
}

pub async fn list_courses(pool: &SqlitePool) -> Result<Vec<Course>, ApiError> {
    let sql = format!("SELECT {COURSE_COLUMNS} FROM courses c ORDER BY c.created_at DESC, c.id DESC");
    Ok(sqlx::query_as::<_, Course>(&sql).fetch_all(pool).await?)
}

/// Courses assigned to `department`, plus the ones assigned to everyone.
pub async fn department_courses(pool: &SqlitePool, department: Option<&str>) -> Result<Vec<Course>, ApiError> {
    let sql = format!(
        r#"
        SELECT {COURSE_COLUMNS} FROM courses c
        WHERE c.department IS NULL OR c.department = ?
        ORDER BY c.deadline IS NULL, c.deadline, c.id
        "#
    );
    Ok(sqlx::query_as::<_, Course>(&sql).bind(department).fetch_all(pool).await?)
}

pub async fn get_course(pool: &SqlitePool, id: i64) -> Result<Course, ApiError> {
    let sql = format!("SELECT {COURSE_COLUMNS} FROM courses c WHERE c.id = ?");
    sqlx::query_as::<_, Course>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Course not found"))
}

#[instrument(skip(pool, course), fields(name = %course.name))]
pub async fn create_course(pool: &SqlitePool, course: NewCourse) -> Result<i64, ApiError> {
    let id = sqlx::query(
        "INSERT INTO courses (name, description, type, department, target_role, deadline) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&course.name)
    .bind(&course.description)
    .bind(&course.course_type)
    .bind(&course.department)
    .bind(&course.target_role)
    .bind(course.deadline)
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!(course_id = id, "Course created");
    Ok(id)
}

#[instrument(skip(pool, notes))]
pub async fn submit(pool: &SqlitePool, employee_id: &str, course_id: i64, notes: Option<&str>) -> Result<i64, ApiError> {
    get_course(pool, course_id).await?;

    let open: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM course_submissions WHERE employee_id = ? AND course_id = ? AND status IN (?, ?)",
    )
    .bind(employee_id)
    .bind(course_id)
    .bind(SubmissionStatus::Pending.as_ref())
    .bind(SubmissionStatus::Approved.as_ref())
    .fetch_one(pool)
    .await?;
    if open > 0 {
        return Err(ApiError::conflict("A submission for this course already exists"));
    }

    let id = sqlx::query(
        "INSERT INTO course_submissions (employee_id, course_id, completion_notes, status) VALUES (?, ?, ?, ?)",
    )
    .bind(employee_id)
    .bind(course_id)
    .bind(notes)
    .bind(SubmissionStatus::Pending.as_ref())
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!(submission_id = id, "Course submission sent");
    Ok(id)
}

pub async fn my_submissions(pool: &SqlitePool, employee_id: &str) -> Result<Vec<SubmissionDetail>, ApiError> {
    let sql = format!(
        r#"
        SELECT {SUBMISSION_COLUMNS}, c.name AS course_name
        FROM course_submissions s
        JOIN courses c ON c.id = s.course_id
        WHERE s.employee_id = ?
        ORDER BY s.submitted_at DESC, s.id DESC
        "#
    );
    Ok(sqlx::query_as::<_, SubmissionDetail>(&sql)
        .bind(employee_id)
        .fetch_all(pool)
        .await?)
}

pub async fn pending_submissions(pool: &SqlitePool) -> Result<Vec<SubmissionDetail>, ApiError> {
    let sql = format!(
        r#"
        SELECT {SUBMISSION_COLUMNS}, c.name AS course_name, u.name AS employee_name
        FROM course_submissions s
        JOIN courses c ON c.id = s.course_id
        JOIN users u ON u.employee_id = s.employee_id
        WHERE s.status = ?
        ORDER BY s.submitted_at, s.id
        "#
    );
    Ok(sqlx::query_as::<_, SubmissionDetail>(&sql)
        .bind(SubmissionStatus::Pending.as_ref())
        .fetch_all(pool)
        .await?)
}

#[instrument(skip(pool, comment))]
pub async fn review_submission(
    pool: &SqlitePool,
    id: i64,
    reviewer: &str,
    status: SubmissionStatus,
    comment: Option<&str>,
) -> Result<(), ApiError> {
    let sql = format!("SELECT {SUBMISSION_COLUMNS} FROM course_submissions s WHERE s.id = ?");
    let submission = sqlx::query_as::<_, CourseSubmission>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Submission not found"))?;

    if submission.employee_id == reviewer {
        return Err(ApiError::forbidden("You cannot review your own submission"));
    }
    if status == SubmissionStatus::Pending {
        return Err(ApiError::bad_request("Invalid status. Must be Approved or Rejected"));
    }

    let updated = sqlx::query(
        r#"
        UPDATE course_submissions
        SET status = ?, reviewer_comment = ?, reviewed_by = ?, reviewed_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(status.as_ref())
    .bind(comment)
    .bind(reviewer)
    .bind(now())
    .bind(id)
    .bind(SubmissionStatus::Pending.as_ref())
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(ApiError::bad_request("Submission is not pending"));
    }

    info!(status = %status, "Submission reviewed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    async fn setup() -> SqlitePool {
        let pool = init_db("sqlite::memory:").await.unwrap();
        sqlx::query(
            "INSERT INTO users (employee_id, name, email, role, password_hash, department) VALUES
             ('EMP0001', 'Admin', 'admin@example.com', 'Admin', 'x', 'HR'),
             ('EMP0002', 'Jane Doe', 'jane@example.com', 'Employee', 'x', 'Engineering')",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    fn course(name: &str, department: Option<&str>) -> NewCourse {
        NewCourse {
            name: name.into(),
            course_type: "Mandatory".into(),
            department: department.map(String::from),
            ..Default::default()
        }
    }

    #[actix_web::test]
    async fn department_courses_include_shared_ones() {
        let pool = setup().await;
        create_course(&pool, course("Code of Conduct", None)).await.unwrap();
        create_course(&pool, course("Secure Coding", Some("Engineering"))).await.unwrap();
        create_course(&pool, course("Payroll Basics", Some("Finance"))).await.unwrap();

        let names: Vec<String> = department_courses(&pool, Some("Engineering"))
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["Code of Conduct", "Secure Coding"]);

        let newest = list_courses(&pool).await.unwrap();
        assert_eq!(newest[0].name, "Payroll Basics");
    }

    #[actix_web::test]
    async fn resubmission_only_after_rejection() {
        let pool = setup().await;
        let course_id = create_course(&pool, course("Code of Conduct", None)).await.unwrap();

        let first = submit(&pool, "EMP0002", course_id, Some("done")).await.unwrap();
        assert!(matches!(submit(&pool, "EMP0002", course_id, None).await, Err(ApiError::Conflict(_))));
        assert!(matches!(submit(&pool, "EMP0002", 999, None).await, Err(ApiError::NotFound(_))));

        review_submission(&pool, first, "EMP0001", SubmissionStatus::Rejected, Some("missing certificate"))
            .await
            .unwrap();
        submit(&pool, "EMP0002", course_id, Some("certificate attached")).await.unwrap();

        let mine = my_submissions(&pool, "EMP0002").await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].course_name, "Code of Conduct");
        assert!(mine[0].employee_name.is_none());

        let pending = pending_submissions(&pool).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].employee_name.as_deref(), Some("Jane Doe"));
    }

    #[actix_web::test]
    async fn review_guards() {
        let pool = setup().await;
        let course_id = create_course(&pool, course("Code of Conduct", None)).await.unwrap();
        let id = submit(&pool, "EMP0002", course_id, None).await.unwrap();

        let own = review_submission(&pool, id, "EMP0002", SubmissionStatus::Approved, None).await;
        assert!(matches!(own, Err(ApiError::Forbidden(_))));

        let invalid = review_submission(&pool, id, "EMP0001", SubmissionStatus::Pending, None).await;
        assert!(matches!(invalid, Err(ApiError::BadRequest(_))));

        review_submission(&pool, id, "EMP0001", SubmissionStatus::Approved, None).await.unwrap();
        let again = review_submission(&pool, id, "EMP0001", SubmissionStatus::Rejected, None).await;
        assert!(matches!(again, Err(ApiError::BadRequest(_))));

        let missing = review_submission(&pool, 42, "EMP0001", SubmissionStatus::Approved, None).await;
        assert!(matches!(missing, Err(ApiError::NotFound(_))));
    }
}
