use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use tracing::{info, warn};

use crate::error::validation::{validate_email, validate_password, validate_username};
use crate::error::{AppError, AppResult, FieldErrors, OptionExt};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::auth::{AuthUser, MaybeAuthUser, NO_CREDENTIALS};
use crate::middleware::ip::{extract_client_ip, MaybeRemoteAddr};
use crate::middleware::rate_limit::REGISTRATION_ENDPOINT;
use crate::middleware::validation::sanitize_for_logging;
use crate::pagination::{Page, PageParams, PageRequest, Paged};
use crate::render;
use crate::state::AppState;
use crate::store::follows;
use crate::store::users::{self, NewUser, EMAIL_TAKEN, USERNAME_TAKEN};
use crate::types::{CreateUserRequest, FollowResponse, UserDto};

pub const FOREIGN_FOLLOW: &str = "Cannot change follows on behalf of another user.";

/// Lists users. Anonymous callers get 403 here, not 401.
pub async fn list_users(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    uri: Uri,
    ApiQuery(params): ApiQuery<PageParams>,
) -> AppResult<Json<Page<UserDto>>> {
    if user.is_none() {
        return Err(AppError::Forbidden(NO_CREDENTIALS.to_string()));
    }

    let page = PageRequest::from_params(&params, &state.config.pagination)?;
    let paged = users::list(&state.db, page).await?;
    let rendered = render::users(&state.db, paged.items).await?;
    let paged = Paged { count: paged.count, items: rendered };
    Ok(Json(Page::new(paged, page, &uri)))
}

/// Registration. Public, but limited per client IP.
pub async fn create_user(
    State(state): State<AppState>,
    remote: MaybeRemoteAddr,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> AppResult<impl IntoResponse> {
    let ip = extract_client_ip(&headers, remote.ip(), state.config.server.trust_proxy_headers);
    if let Err(e) = state.endpoint_limiter.check_endpoint_limit(REGISTRATION_ENDPOINT, ip).await {
        state.metrics.inc_rate_limited();
        warn!("Registration rate limit exceeded for {}", ip);
        return Err(e);
    }

    let mut errors = FieldErrors::new();
    validate_username(&mut errors, &req.username);
    validate_email(&mut errors, &req.email);
    validate_password(&mut errors, &req.password);
    if errors.get("username").is_none() && users::username_taken(&state.db, &req.username).await? {
        errors.add("username", USERNAME_TAKEN);
    }
    if errors.get("email").is_none() && users::email_taken(&state.db, &req.email).await? {
        errors.add("email", EMAIL_TAKEN);
    }
    if !errors.is_empty() {
        warn!("Rejected registration for '{}': {}", sanitize_for_logging(&req.username), errors);
        return Err(AppError::Validation(errors));
    }

    let password_hash = crate::password::hash_blocking(req.password).await?;
    let user = users::create(
        &state.db,
        &NewUser { username: &req.username, email: &req.email, password_hash: &password_hash },
    )
    .await?;
    state.metrics.inc_users_registered();
    info!("Registered user {} ({})", user.id, sanitize_for_logging(&user.username));

    let dto = render::user(&state.db, user).await?;
    Ok((StatusCode::CREATED, Json(dto)))
}

pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(_viewer): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<UserDto>> {
    let user = users::find_by_id(&state.db, id).await?.ok_or_not_found(format!("User {} not found", id))?;
    Ok(Json(render::user(&state.db, user).await?))
}

fn ensure_acting_user(acting_id: i64, user_id: i64) -> AppResult<()> {
    if acting_id != user_id {
        warn!("User {} tried to change follows of user {}", acting_id, user_id);
        return Err(AppError::Forbidden(FOREIGN_FOLLOW.to_string()));
    }
    Ok(())
}

pub async fn follow_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((user_id, follow_id)): ApiPath<(i64, i64)>,
) -> AppResult<Json<FollowResponse>> {
    ensure_acting_user(user.id, user_id)?;

    let target = follows::follow(&state.db, &user, follow_id).await?;
    state.metrics.inc_follows_created();
    info!("User {} now follows user {}", user.id, target.id);

    Ok(Json(FollowResponse { success: format!("Now following user {}", target.username) }))
}

pub async fn unfollow_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath((user_id, follow_id)): ApiPath<(i64, i64)>,
) -> AppResult<StatusCode> {
    ensure_acting_user(user.id, user_id)?;

    follows::unfollow(&state.db, &user, follow_id).await?;
    state.metrics.inc_follows_removed();
    info!("User {} unfollowed user {}", user.id, follow_id);

    Ok(StatusCode::NO_CONTENT)
}
