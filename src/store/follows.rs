use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::{validation::validate_positive_id, AppError, AppResult, OptionExt};
use crate::models::{to_db_timestamp, User, UserRef};

pub const ALREADY_FOLLOWING: &str = "Already following this user.";
pub const NOT_FOLLOWING: &str = "Not following this user.";
pub const TARGET_MISSING: &str = "User with this follow_id does not exist.";
pub const SELF_FOLLOW: &str = "Cannot follow yourself.";

/// Adds the edge `acting -> target_id` and returns the followed user.
///
/// The edge is written by one INSERT; a duplicate (including one racing in from another
/// request) is rejected by the primary key and reported as already following.
pub async fn follow(pool: &SqlitePool, acting: &User, target_id: i64) -> AppResult<User> {
    validate_positive_id(target_id, "follow_id")?;

    let target = sqlx::query_as::<_, User>(
        "SELECT id, username, email, password_hash, created_at FROM users WHERE id = ?1",
    )
    .bind(target_id)
    .fetch_optional(pool)
    .await?
    .ok_or_not_found(TARGET_MISSING)?;

    if target.id == acting.id {
        return Err(AppError::BadRequest(SELF_FOLLOW.to_string()));
    }

    sqlx::query("INSERT INTO follows (follower_id, followee_id, created_at) VALUES (?1, ?2, ?3)")
        .bind(acting.id)
        .bind(target.id)
        .bind(to_db_timestamp(chrono::Utc::now()))
        .execute(pool)
        .await
        .map_err(|e| {
            if super::is_unique_violation(&e) {
                AppError::BadRequest(ALREADY_FOLLOWING.to_string())
            } else if super::is_foreign_key_violation(&e) {
                // Target deleted between the lookup and the insert
                AppError::NotFound(TARGET_MISSING.to_string())
            } else {
                e.into()
            }
        })?;

    Ok(target)
}

/// Removes the edge `acting -> target_id`.
pub async fn unfollow(pool: &SqlitePool, acting: &User, target_id: i64) -> AppResult<()> {
    validate_positive_id(target_id, "follow_id")?;

    let res = sqlx::query("DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2")
        .bind(acting.id)
        .bind(target_id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(NOT_FOLLOWING.to_string()));
    }
    Ok(())
}

#[derive(sqlx::FromRow)]
struct EdgeRow {
    owner_id: i64,
    id: i64,
    username: String,
}

/// Followers of each user in `user_ids`, keyed by the followed user.
pub async fn followers_of(pool: &SqlitePool, user_ids: &[i64]) -> AppResult<HashMap<i64, Vec<UserRef>>> {
    edges(
        pool,
        user_ids,
        "SELECT f.followee_id AS owner_id, u.id, u.username FROM follows f \
         JOIN users u ON u.id = f.follower_id WHERE f.followee_id IN (",
    )
    .await
}

/// Users followed by each user in `user_ids`, keyed by the follower.
pub async fn following_of(pool: &SqlitePool, user_ids: &[i64]) -> AppResult<HashMap<i64, Vec<UserRef>>> {
    edges(
        pool,
        user_ids,
        "SELECT f.follower_id AS owner_id, u.id, u.username FROM follows f \
         JOIN users u ON u.id = f.followee_id WHERE f.follower_id IN (",
    )
    .await
}

async fn edges(pool: &SqlitePool, user_ids: &[i64], head: &str) -> AppResult<HashMap<i64, Vec<UserRef>>> {
    let mut out: HashMap<i64, Vec<UserRef>> = HashMap::new();
    if user_ids.is_empty() {
        return Ok(out);
    }

    let mut qb = QueryBuilder::<Sqlite>::new(head);
    let mut ids = qb.separated(", ");
    for id in user_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(") ORDER BY u.id ASC");

    let rows: Vec<EdgeRow> = qb.build_query_as().fetch_all(pool).await?;
    for row in rows {
        out.entry(row.owner_id).or_default().push(UserRef { id: row.id, username: row.username });
    }
    Ok(out)
}
