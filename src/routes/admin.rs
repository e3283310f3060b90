use axum::{extract::State, http::Uri, Json};

use super::posts::post_filter;
use crate::error::{AppError, AppResult};
use crate::extract::ApiQuery;
use crate::middleware::auth::AuthUser;
use crate::pagination::{Page, PageRequest};
use crate::render;
use crate::state::AppState;
use crate::store::posts;
use crate::types::{PostDto, PostListQuery};

pub const STAFF_ONLY: &str = "You do not have permission to perform this action.";

/// Moderation view: newest posts with every comment attached. Staff only.
pub async fn recent_posts(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    uri: Uri,
    ApiQuery(q): ApiQuery<PostListQuery>,
) -> AppResult<Json<Page<PostDto>>> {
    if !state.config.admin.is_staff(&user.username) {
        tracing::warn!("User {} denied access to admin post review", user.id);
        return Err(AppError::Forbidden(STAFF_ONLY.to_string()));
    }

    let filter = post_filter(&q)?;
    let page = PageRequest::from_params(&q.page, &state.config.pagination)?;
    let paged = posts::recent_with_comments(&state.db, &filter, page).await?;
    Ok(Json(Page::new(paged.map(render::post), page, &uri)))
}
