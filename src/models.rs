//! Persistent entities as they come out of SQLite.
//!
//! Rows that join in an author carry the author's username alongside the foreign key so
//! the serialization layer never has to go back to the database for it.

use chrono::{DateTime, SecondsFormat, Utc};

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// `id` + `username`, the only user fields embedded in other representations.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserRef {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PostWithAuthor {
    pub id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub author_id: i64,
    pub post_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CommentWithAuthor {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl CommentWithAuthor {
    pub fn new(comment: Comment, author: &User) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            author_username: author.username.clone(),
            content: comment.content,
            created_at: comment.created_at,
        }
    }
}

/// A post with its author and an eager-loaded slice of its comments, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostWithComments {
    pub post: PostWithAuthor,
    pub comments: Vec<CommentWithAuthor>,
}

/// Formats a timestamp the way it is stored: fixed-width UTC with milliseconds,
/// so that text comparison in SQL matches chronological order.
pub fn to_db_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
