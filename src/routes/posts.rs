use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use tracing::info;

use crate::error::validation::{parse_date, parse_id, validate_content};
use crate::error::{AppResult, FieldErrors, OptionExt};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::auth::AuthUser;
use crate::models::{CommentWithAuthor, PostWithAuthor, PostWithComments};
use crate::pagination::{Page, PageRequest};
use crate::render;
use crate::state::AppState;
use crate::store::posts::PostFilter;
use crate::store::{comments, posts};
use crate::types::{CommentDto, CreateCommentRequest, CreatePostRequest, PostDto, PostListQuery};

/// Validates the `author_id`/`from_date`/`to_date` query parameters.
pub(crate) fn post_filter(q: &PostListQuery) -> AppResult<PostFilter> {
    Ok(PostFilter {
        author_id: parse_id(q.author_id.as_deref(), "author_id")?,
        from_date: parse_date(q.from_date.as_deref(), "from_date")?,
        to_date: parse_date(q.to_date.as_deref(), "to_date")?,
    })
}

pub async fn list_posts(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    uri: Uri,
    ApiQuery(q): ApiQuery<PostListQuery>,
) -> AppResult<Json<Page<PostDto>>> {
    let filter = post_filter(&q)?;
    let page = PageRequest::from_params(&q.page, &state.config.pagination)?;

    let paged = posts::list(&state.db, &filter, page, state.config.feed.recent_comments).await?;
    Ok(Json(Page::new(paged.map(render::post), page, &uri)))
}

pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<CreatePostRequest>,
) -> AppResult<impl IntoResponse> {
    let mut errors = FieldErrors::new();
    validate_content(&mut errors, &req.content, "Post content cannot be empty");
    errors.into_result()?;

    let post = posts::create(&state.db, user.id, &req.content, Utc::now()).await?;
    state.metrics.inc_posts_created();
    info!("User {} created post {}", user.id, post.id);

    let created = PostWithComments {
        post: PostWithAuthor {
            id: post.id,
            author_id: post.author_id,
            author_username: user.username,
            content: post.content,
            created_at: post.created_at,
        },
        comments: Vec::new(),
    };
    Ok((StatusCode::CREATED, Json(render::post(created))))
}

pub async fn get_post(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<PostDto>> {
    let post = posts::get(&state.db, id, state.config.feed.recent_comments)
        .await?
        .ok_or_not_found(format!("Post #{} not found", id))?;
    Ok(Json(render::post(post)))
}

pub async fn list_comments(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    ApiPath(post_id): ApiPath<i64>,
) -> AppResult<Json<Vec<CommentDto>>> {
    let comments = comments::list_for_post(&state.db, post_id).await?;
    Ok(Json(comments.into_iter().map(render::comment).collect()))
}

pub async fn create_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(post_id): ApiPath<i64>,
    ApiJson(req): ApiJson<CreateCommentRequest>,
) -> AppResult<impl IntoResponse> {
    let mut errors = FieldErrors::new();
    validate_content(&mut errors, &req.content, "Comment content cannot be empty");
    errors.into_result()?;

    let comment = comments::create(&state.db, user.id, post_id, &req.content, Utc::now()).await?;
    state.metrics.inc_comments_created();
    info!("User {} commented on post {} (comment {})", user.id, post_id, comment.id);

    let created = CommentWithAuthor::new(comment, &user);
    Ok((StatusCode::CREATED, Json(render::comment(created))))
}
