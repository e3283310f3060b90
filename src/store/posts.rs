use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::comments;
use crate::error::AppResult;
use crate::models::{to_db_timestamp, Post, PostWithAuthor, PostWithComments};
use crate::pagination::{PageRequest, Paged};

const POST_WITH_AUTHOR_SELECT: &str =
    "SELECT p.id, p.author_id, u.username AS author_username, p.content, p.created_at \
     FROM posts p JOIN users u ON u.id = p.author_id";

/// Optional author and inclusive calendar-date bounds on `created_at` (UTC).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PostFilter {
    pub author_id: Option<i64>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

fn day_start(day: NaiveDate) -> String {
    to_db_timestamp(day.and_time(NaiveTime::MIN).and_utc())
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &PostFilter) {
    qb.push(" WHERE 1=1");
    if let Some(author_id) = filter.author_id {
        qb.push(" AND p.author_id = ").push_bind(author_id);
    }
    if let Some(from) = filter.from_date {
        qb.push(" AND p.created_at >= ").push_bind(day_start(from));
    }
    if let Some(to) = filter.to_date {
        // Whole `to` day is included: compare against the start of the following day
        if let Some(next_day) = to.succ_opt() {
            qb.push(" AND p.created_at < ").push_bind(day_start(next_day));
        }
    }
}

pub async fn create(
    pool: &SqlitePool,
    author_id: i64,
    content: &str,
    created_at: DateTime<Utc>,
) -> AppResult<Post> {
    let post = sqlx::query_as::<_, Post>(
        "INSERT INTO posts (author_id, content, created_at) VALUES (?1, ?2, ?3) \
         RETURNING id, author_id, content, created_at",
    )
    .bind(author_id)
    .bind(content)
    .bind(to_db_timestamp(created_at))
    .fetch_one(pool)
    .await?;
    Ok(post)
}

pub async fn count(pool: &SqlitePool, filter: &PostFilter) -> AppResult<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM posts p");
    push_filters(&mut qb, filter);
    Ok(qb.build_query_scalar::<i64>().fetch_one(pool).await?)
}

pub async fn count_by_author(pool: &SqlitePool, author_id: i64) -> AppResult<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = ?1")
        .bind(author_id)
        .fetch_one(pool)
        .await?)
}

pub async fn exists(pool: &SqlitePool, id: i64) -> AppResult<bool> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE id = ?1")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(n > 0)
}

async fn fetch_page(
    pool: &SqlitePool,
    filter: &PostFilter,
    page: PageRequest,
) -> AppResult<Vec<PostWithAuthor>> {
    let mut qb = QueryBuilder::<Sqlite>::new(POST_WITH_AUTHOR_SELECT);
    push_filters(&mut qb, filter);
    qb.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());
    Ok(qb.build_query_as::<PostWithAuthor>().fetch_all(pool).await?)
}

/// Attaches comments to every post with a single query. `per_post = None` attaches all of them.
async fn attach_comments(
    pool: &SqlitePool,
    posts: Vec<PostWithAuthor>,
    per_post: Option<u32>,
) -> AppResult<Vec<PostWithComments>> {
    let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
    let mut by_post = comments::for_posts(pool, &ids, per_post).await?;
    Ok(posts
        .into_iter()
        .map(|post| {
            let comments = by_post.remove(&post.id).unwrap_or_default();
            PostWithComments { post, comments }
        })
        .collect())
}

/// Newest-first page of posts, each with its author and `recent_comments` latest comments.
pub async fn list(
    pool: &SqlitePool,
    filter: &PostFilter,
    page: PageRequest,
    recent_comments: u32,
) -> AppResult<Paged<PostWithComments>> {
    let count = count(pool, filter).await?;
    page.ensure_in_range(count)?;
    let posts = fetch_page(pool, filter, page).await?;
    let items = attach_comments(pool, posts, Some(recent_comments)).await?;
    Ok(Paged { count, items })
}

/// One post with its author and `recent_comments` latest comments.
pub async fn get(pool: &SqlitePool, id: i64, recent_comments: u32) -> AppResult<Option<PostWithComments>> {
    let sql = format!("{} WHERE p.id = ?1", POST_WITH_AUTHOR_SELECT);
    let post = sqlx::query_as::<_, PostWithAuthor>(&sql).bind(id).fetch_optional(pool).await?;
    match post {
        None => Ok(None),
        Some(post) => Ok(attach_comments(pool, vec![post], Some(recent_comments)).await?.pop()),
    }
}

/// Newest-first posts with every comment attached, for moderation.
pub async fn recent_with_comments(
    pool: &SqlitePool,
    filter: &PostFilter,
    page: PageRequest,
) -> AppResult<Paged<PostWithComments>> {
    let count = count(pool, filter).await?;
    page.ensure_in_range(count)?;
    let posts = fetch_page(pool, filter, page).await?;
    let items = attach_comments(pool, posts, None).await?;
    Ok(Paged { count, items })
}
