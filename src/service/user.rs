use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, instrument};

use crate::auth::password::hash_password;
use crate::error::ApiError;
use crate::model::leave::LeaveType;
use crate::model::role::Role;
use crate::model::user::{User, UserStatus};
use crate::utils::dates::now;
use crate::utils::db_utils::SqlUpdate;
use crate::utils::email_index::EmailIndex;
use crate::utils::pagination::{Paginated, Pagination};

pub const DUPLICATE_EMAIL: &str = "User with this email already exists.";

const USER_COLUMNS: &str = "id, employee_id, name, email, phone, department, role, password_hash, \
                            status, last_login_at, created_at, updated_at";

/// Validated input for a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub role: Role,
    pub password: String,
}

/// Validated partial update; `None` leaves the column untouched.
#[derive(Debug, Default, Clone)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    /// `Some(None)` clears the column.
    pub phone: Option<Option<String>>,
    pub department: Option<Option<String>>,
    pub role: Option<Role>,
}

fn duplicate_email(e: sqlx::Error) -> ApiError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => ApiError::bad_request(DUPLICATE_EMAIL),
        _ => e.into(),
    }
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, ApiError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE");
    Ok(sqlx::query_as::<_, User>(&sql)
        .bind(email.trim())
        .fetch_optional(pool)
        .await?)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, ApiError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    Ok(sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(pool).await?)
}

pub async fn find_by_employee_id(pool: &SqlitePool, employee_id: &str) -> Result<Option<User>, ApiError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE employee_id = ?");
    Ok(sqlx::query_as::<_, User>(&sql)
        .bind(employee_id)
        .fetch_optional(pool)
        .await?)
}

/// Like [`find_by_employee_id`] but a missing user is a 404.
pub async fn get_user(pool: &SqlitePool, employee_id: &str) -> Result<User, ApiError> {
    find_by_employee_id(pool, employee_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// Inserts the user row and derives its `EMPnnnn` id from the row id.
async fn insert_user(conn: &mut SqliteConnection, user: &NewUser, password_hash: &str) -> Result<String, sqlx::Error> {
    let placeholder = format!("PENDING-{}", uuid::Uuid::new_v4());

    let id = sqlx::query(
        r#"
        INSERT INTO users (employee_id, name, email, phone, department, role, password_hash)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&placeholder)
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.phone)
    .bind(&user.department)
    .bind(user.role.as_ref())
    .bind(password_hash)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    sqlx::query("UPDATE users SET employee_id = printf('EMP%04d', id) WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    sqlx::query_scalar("SELECT employee_id FROM users WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await
}

/// Creates the account together with an empty profile and a default leave balance.
#[instrument(skip(pool, index, user), fields(email = %user.email))]
pub async fn create_user(pool: &SqlitePool, index: &EmailIndex, user: NewUser) -> Result<User, ApiError> {
    if !index.is_available(pool, &user.email).await? {
        info!("Rejected duplicate email");
        return Err(ApiError::bad_request(DUPLICATE_EMAIL));
    }

    let password_hash = hash_password(&user.password).map_err(|e| ApiError::internal(format!("hash: {e}")))?;

    let mut tx = pool.begin().await?;

    let employee_id = insert_user(&mut tx, &user, &password_hash)
        .await
        .map_err(duplicate_email)?;

    sqlx::query("INSERT INTO employee_profiles (employee_id) VALUES (?)")
        .bind(&employee_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "INSERT INTO leave_balances (employee_id, annual, casual, sick, maternity) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&employee_id)
    .bind(LeaveType::Annual.default_balance())
    .bind(LeaveType::Casual.default_balance())
    .bind(LeaveType::Sick.default_balance())
    .bind(LeaveType::Maternity.default_balance())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    index.register(&user.email).await;
    info!(employee_id = %employee_id, "User created");

    get_user(pool, &employee_id).await
}

pub async fn list_users(pool: &SqlitePool, p: Pagination) -> Result<Paginated<User>, ApiError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(pool).await?;

    let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?");
    let users = sqlx::query_as::<_, User>(&sql)
        .bind(p.limit())
        .bind(p.offset())
        .fetch_all(pool)
        .await?;

    Ok(Paginated::new(users, total, p))
}

pub async fn search_users(pool: &SqlitePool, name: &str) -> Result<Vec<User>, ApiError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE name LIKE ? ORDER BY name");
    Ok(sqlx::query_as::<_, User>(&sql)
        .bind(format!("%{}%", name.trim()))
        .fetch_all(pool)
        .await?)
}

#[instrument(skip(pool, index, changes))]
pub async fn update_user(
    pool: &SqlitePool,
    index: &EmailIndex,
    employee_id: &str,
    changes: UserChanges,
) -> Result<(), ApiError> {
    let current = get_user(pool, employee_id).await?;

    let new_email = changes
        .email
        .filter(|email| !email.eq_ignore_ascii_case(&current.email));

    if let Some(email) = &new_email {
        if !index.is_available(pool, email).await? {
            return Err(ApiError::bad_request(DUPLICATE_EMAIL));
        }
    }

    let mut update = SqlUpdate::new("users", "employee_id");
    update
        .set_opt("name", changes.name)
        .set_opt("email", new_email.clone())
        .set_opt("phone", changes.phone)
        .set_opt("department", changes.department)
        .set_opt("role", changes.role.map(|r| r.to_string()));

    if update.is_empty() {
        return Ok(());
    }
    update.set("updated_at", now());

    update.execute(pool, employee_id).await.map_err(duplicate_email)?;

    if let Some(email) = new_email {
        index.unregister(&current.email).await;
        index.register(&email).await;
    }

    info!("User updated");
    Ok(())
}

/// Soft delete. Outstanding refresh tokens are revoked too.
pub async fn deactivate_user(pool: &SqlitePool, employee_id: &str) -> Result<(), ApiError> {
    let user = get_user(pool, employee_id).await?;

    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE id = ?")
        .bind(UserStatus::Inactive.as_ref())
        .bind(now())
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ?")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(employee_id, "User deactivated");
    Ok(())
}

/// Hard delete; dependent rows go with it through `ON DELETE CASCADE`.
pub async fn delete_user(pool: &SqlitePool, index: &EmailIndex, employee_id: &str) -> Result<(), ApiError> {
    let user = get_user(pool, employee_id).await?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user.id)
        .execute(pool)
        .await?;

    index.unregister(&user.email).await;
    info!(employee_id, "User deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::model::leave::LeaveBalance;
    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Jane Doe".into(),
            email: email.into(),
            phone: None,
            department: Some("Engineering".into()),
            role: Role::Employee,
            password: "password123".into(),
        }
    }

    #[actix_web::test]
    async fn employee_ids_follow_row_ids() {
        let pool = init_db("sqlite::memory:").await.unwrap();
        let index = EmailIndex::default();

        let first = create_user(&pool, &index, new_user("a@example.com")).await.unwrap();
        let second = create_user(&pool, &index, new_user("b@example.com")).await.unwrap();

        assert_eq!(first.employee_id, "EMP0001");
        assert_eq!(second.employee_id, "EMP0002");
        assert!(first.is_active());
        assert_eq!(first.role(), Some(Role::Employee));
    }

    #[actix_web::test]
    async fn creation_seeds_profile_and_balance() {
        let pool = init_db("sqlite::memory:").await.unwrap();
        let index = EmailIndex::default();
        let user = create_user(&pool, &index, new_user("c@example.com")).await.unwrap();

        let balance = sqlx::query_as::<_, LeaveBalance>("SELECT * FROM leave_balances WHERE employee_id = ?")
            .bind(&user.employee_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!((balance.annual, balance.casual, balance.sick, balance.maternity), (21, 10, 8, 90));

        let profiles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employee_profiles WHERE employee_id = ?")
            .bind(&user.employee_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(profiles, 1);
    }

    #[actix_web::test]
    async fn duplicate_email_is_rejected_even_with_cold_index() {
        let pool = init_db("sqlite::memory:").await.unwrap();
        create_user(&pool, &EmailIndex::default(), new_user("dup@example.com"))
            .await
            .unwrap();

        // a fresh index knows nothing, so the unique constraint has to catch it
        let err = create_user(&pool, &EmailIndex::default(), new_user("DUP@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(msg) if msg == DUPLICATE_EMAIL));
    }

    #[actix_web::test]
    async fn update_changes_only_given_columns() {
        let pool = init_db("sqlite::memory:").await.unwrap();
        let index = EmailIndex::default();
        let user = create_user(&pool, &index, new_user("d@example.com")).await.unwrap();

        let changes = UserChanges {
            department: Some(Some("Finance".into())),
            role: Some(Role::Manager),
            ..Default::default()
        };
        update_user(&pool, &index, &user.employee_id, changes).await.unwrap();

        let updated = get_user(&pool, &user.employee_id).await.unwrap();
        assert_eq!(updated.department.as_deref(), Some("Finance"));
        assert_eq!(updated.role, "Manager");
        assert_eq!(updated.name, "Jane Doe");
    }

    #[actix_web::test]
    async fn update_can_clear_department() {
        let pool = init_db("sqlite::memory:").await.unwrap();
        let index = EmailIndex::default();
        let user = create_user(&pool, &index, new_user("f@example.com")).await.unwrap();

        let changes = UserChanges {
            department: Some(None),
            ..Default::default()
        };
        update_user(&pool, &index, &user.employee_id, changes).await.unwrap();

        let updated = get_user(&pool, &user.employee_id).await.unwrap();
        assert_eq!(updated.department, None);
        assert_eq!(updated.phone, None);
    }

    #[actix_web::test]
    async fn column_defaults_use_the_local_clock() {
        let pool = init_db("sqlite::memory:").await.unwrap();
        let user = create_user(&pool, &EmailIndex::default(), new_user("g@example.com"))
            .await
            .unwrap();

        let drift = (now() - user.created_at).num_seconds().abs();
        assert!(drift < 60, "created_at is {drift}s away from local now");
    }

    #[actix_web::test]
    async fn delete_cascades() {
        let pool = init_db("sqlite::memory:").await.unwrap();
        let index = EmailIndex::default();
        let user = create_user(&pool, &index, new_user("e@example.com")).await.unwrap();

        delete_user(&pool, &index, &user.employee_id).await.unwrap();

        let balances: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leave_balances")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(balances, 0);
        assert!(index.is_available(&pool, "e@example.com").await.unwrap());
        assert!(matches!(
            delete_user(&pool, &index, &user.employee_id).await,
            Err(ApiError::NotFound(_))
        ));
    }
}
