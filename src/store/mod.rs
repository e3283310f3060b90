//! Entity stores and the query layer on top of them.
//!
//! Every function takes the pool (or an open transaction) explicitly and returns
//! [`AppResult`](crate::error::AppResult), so not-found and validation failures surface
//! with their final HTTP meaning. Related rows are loaded in batches: a page of posts
//! costs one query for the posts, one for their comments, never one per post.

pub mod comments;
pub mod follows;
pub mod posts;
pub mod users;

/// `true` when `err` is a UNIQUE/PRIMARY KEY violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// `true` when `err` is a FOREIGN KEY violation.
pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}
