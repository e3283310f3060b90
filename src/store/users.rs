use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::{AppError, AppResult, FieldErrors};
use crate::models::{to_db_timestamp, User};
use crate::pagination::{PageRequest, Paged};

const USER_COLUMNS: &str = "id, username, email, password_hash, created_at";

pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const EMAIL_TAKEN: &str = "Email already in use";

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

/// Inserts a user. Uniqueness races that slip past the pre-checks come back as field errors.
pub async fn create(pool: &SqlitePool, new: &NewUser<'_>) -> AppResult<User> {
    let sql = format!(
        "INSERT INTO users (username, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4) RETURNING {}",
        USER_COLUMNS
    );
    sqlx::query_as::<_, User>(&sql)
        .bind(new.username)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(to_db_timestamp(Utc::now()))
        .fetch_one(pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                if db_err.message().contains("email") {
                    AppError::Validation(FieldErrors::single("email", EMAIL_TAKEN))
                } else {
                    AppError::Validation(FieldErrors::single("username", USERNAME_TAKEN))
                }
            }
            _ => e.into(),
        })
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> AppResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    Ok(sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(pool).await?)
}

pub async fn find_by_username(pool: &SqlitePool, username: &str) -> AppResult<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS);
    Ok(sqlx::query_as::<_, User>(&sql).bind(username).fetch_optional(pool).await?)
}

pub async fn username_taken(pool: &SqlitePool, username: &str) -> AppResult<bool> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?1")
        .bind(username)
        .fetch_one(pool)
        .await?;
    Ok(n > 0)
}

pub async fn email_taken(pool: &SqlitePool, email: &str) -> AppResult<bool> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?1 COLLATE NOCASE")
        .bind(email)
        .fetch_one(pool)
        .await?;
    Ok(n > 0)
}

/// Users in registration order.
pub async fn list(pool: &SqlitePool, page: PageRequest) -> AppResult<Paged<User>> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(pool).await?;
    page.ensure_in_range(count)?;

    let sql = format!("SELECT {} FROM users ORDER BY id ASC LIMIT ?1 OFFSET ?2", USER_COLUMNS);
    let items = sqlx::query_as::<_, User>(&sql)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool)
        .await?;
    Ok(Paged { count, items })
}
