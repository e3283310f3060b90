//! # Plaza
//!
//! A small social-networking backend: users register, write posts, comment on posts and
//! follow each other. Everything is exposed as a JSON REST API with page-number pagination.
//!
//! ## Architecture
//!
//! - **Axum**: HTTP server, routing and extractors
//! - **SQLx**: asynchronous SQLite access
//! - **Tokio**: async runtime
//! - **Serde**: JSON (de)serialization
//!
//! ## Core Components
//!
//! - [`config`]: layered configuration (embedded defaults, files, environment)
//! - [`db`]: pool creation and schema initialization
//! - [`error`]: the application error type and input validation helpers
//! - [`store`]: SQL for users, follows, posts and comments
//! - [`pagination`]: page requests and `count/next/previous/results` pages
//! - [`render`]: entity to wire-type mapping
//! - [`routes`]: HTTP handlers
//! - [`middleware`]: authentication, rate limiting, security headers, request screening
//! - [`state`]: shared application state

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod password;
pub mod render;
pub mod routes;
pub mod state;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use state::AppState;

/// Builds the full application router with every middleware layer except CORS.
pub fn app(state: AppState) -> Router {
    let cfg = state.config.clone();
    let max_body_bytes = cfg.limits.max_body_bytes;

    let api = Router::new()
        .route("/api/posts/", get(routes::posts::list_posts).post(routes::posts::create_post))
        .route("/api/posts/{id}/", get(routes::posts::get_post))
        .route(
            "/api/posts/{id}/comments/",
            get(routes::posts::list_comments).post(routes::posts::create_comment),
        )
        .route("/api/users/", get(routes::users::list_users).post(routes::users::create_user))
        .route("/api/users/{id}/", get(routes::users::get_user))
        .route(
            "/api/users/{user_id}/follow/{follow_id}/",
            post(routes::users::follow_user).delete(routes::users::unfollow_user),
        )
        .route("/api/admin/posts/recent/", get(routes::admin::recent_posts))
        .route_layer(from_fn_with_state(state.clone(), middleware::rate_limit::rate_limit_middleware));

    Router::new()
        .route("/healthz", get(routes::health::healthz))
        .route("/readyz", get(routes::health::readyz))
        .route("/metrics", get(routes::health::metrics))
        .route("/metrics/prometheus", get(routes::health::metrics_prometheus))
        .route("/version", get(routes::health::version))
        .merge(api)
        .fallback(not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(from_fn_with_state(cfg.clone(), middleware::validation::validate_request_middleware))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(cfg, middleware::security_headers::security_headers_middleware))
}

async fn not_found() -> error::AppError {
    error::AppError::NotFound("Not found.".to_string())
}
