use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::{AppError, AppResult};
use crate::models::{to_db_timestamp, Comment, CommentWithAuthor};

fn post_not_found(post_id: i64) -> AppError {
    AppError::NotFound(format!("Post #{} not found", post_id))
}

/// Inserts a comment. A missing post surfaces as the FOREIGN KEY violation of the single
/// INSERT, so concurrent writers only ever wait on SQLite's write lock.
pub async fn create(
    pool: &SqlitePool,
    author_id: i64,
    post_id: i64,
    content: &str,
    created_at: DateTime<Utc>,
) -> AppResult<Comment> {
    let comment = sqlx::query_as::<_, Comment>(
        "INSERT INTO comments (author_id, post_id, content, created_at) VALUES (?1, ?2, ?3, ?4) \
         RETURNING id, author_id, post_id, content, created_at",
    )
    .bind(author_id)
    .bind(post_id)
    .bind(content)
    .bind(to_db_timestamp(created_at))
    .fetch_one(pool)
    .await
    .map_err(|e| if super::is_foreign_key_violation(&e) { post_not_found(post_id) } else { e.into() })?;
    Ok(comment)
}

/// Every comment of a post, oldest first.
pub async fn list_for_post(pool: &SqlitePool, post_id: i64) -> AppResult<Vec<CommentWithAuthor>> {
    if !super::posts::exists(pool, post_id).await? {
        return Err(post_not_found(post_id));
    }
    let comments = sqlx::query_as::<_, CommentWithAuthor>(
        "SELECT c.id, c.post_id, c.author_id, u.username AS author_username, c.content, c.created_at \
         FROM comments c JOIN users u ON u.id = c.author_id \
         WHERE c.post_id = ?1 ORDER BY c.created_at ASC, c.id ASC",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await?;
    Ok(comments)
}

pub async fn count_by_author(pool: &SqlitePool, author_id: i64) -> AppResult<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE author_id = ?1")
        .bind(author_id)
        .fetch_one(pool)
        .await?)
}

/// Comments of several posts in one round trip, newest first per post.
///
/// With `per_post = Some(n)` only the `n` latest comments of each post are returned.
pub async fn for_posts(
    pool: &SqlitePool,
    post_ids: &[i64],
    per_post: Option<u32>,
) -> AppResult<HashMap<i64, Vec<CommentWithAuthor>>> {
    let mut out: HashMap<i64, Vec<CommentWithAuthor>> = HashMap::new();
    if post_ids.is_empty() {
        return Ok(out);
    }

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT id, post_id, author_id, author_username, content, created_at FROM ( \
           SELECT c.id, c.post_id, c.author_id, u.username AS author_username, c.content, c.created_at, \
                  ROW_NUMBER() OVER (PARTITION BY c.post_id ORDER BY c.created_at DESC, c.id DESC) AS rn \
           FROM comments c JOIN users u ON u.id = c.author_id \
           WHERE c.post_id IN (",
    );
    let mut ids = qb.separated(", ");
    for id in post_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(")) ranked");
    if let Some(limit) = per_post {
        qb.push(" WHERE rn <= ").push_bind(i64::from(limit));
    }
    qb.push(" ORDER BY post_id, created_at DESC, id DESC");

    let rows: Vec<CommentWithAuthor> = qb.build_query_as().fetch_all(pool).await?;
    for row in rows {
        out.entry(row.post_id).or_default().push(row);
    }
    Ok(out)
}
