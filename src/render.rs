//! Maps entities to their wire representations.
//!
//! Post and comment rendering is pure: everything needed was eager-loaded by the store.
//! User rendering is not. Post and comment totals are point `COUNT(*)` queries made on
//! every call, and follower/following lists are fetched in one batch per call.

use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};
use crate::models::{CommentWithAuthor, PostWithComments, User, UserRef};
use crate::store::{comments, follows, posts};
use crate::types::{CommentDto, PostDto, UserDto, UserSummary};

impl From<UserRef> for UserSummary {
    fn from(user: UserRef) -> Self {
        Self { id: user.id, username: user.username }
    }
}

pub fn comment(c: CommentWithAuthor) -> CommentDto {
    CommentDto {
        id: c.id,
        author: UserSummary { id: c.author_id, username: c.author_username },
        post: c.post_id,
        content: c.content,
        created_at: c.created_at,
    }
}

pub fn post(p: PostWithComments) -> PostDto {
    let PostWithComments { post, comments } = p;
    PostDto {
        id: post.id,
        author: UserSummary { id: post.author_id, username: post.author_username },
        content: post.content,
        created_at: post.created_at,
        comments: comments.into_iter().map(comment).collect(),
    }
}

pub async fn user(pool: &SqlitePool, user: User) -> AppResult<UserDto> {
    let mut rendered = users(pool, vec![user]).await?;
    rendered.pop().ok_or_else(|| AppError::Internal(anyhow::anyhow!("user rendering produced no output")))
}

pub async fn users(pool: &SqlitePool, users: Vec<User>) -> AppResult<Vec<UserDto>> {
    let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
    let mut followers = follows::followers_of(pool, &ids).await?;
    let mut following = follows::following_of(pool, &ids).await?;

    let mut out = Vec::with_capacity(users.len());
    for u in users {
        let total_posts = posts::count_by_author(pool, u.id).await?;
        let total_comments = comments::count_by_author(pool, u.id).await?;
        out.push(UserDto {
            id: u.id,
            total_posts,
            total_comments,
            followers: summaries(followers.remove(&u.id)),
            following: summaries(following.remove(&u.id)),
            username: u.username,
            email: u.email,
        });
    }
    Ok(out)
}

fn summaries(refs: Option<Vec<UserRef>>) -> Vec<UserSummary> {
    refs.unwrap_or_default().into_iter().map(UserSummary::from).collect()
}
