//! Integration tests driving the full router against an in-memory SQLite database.
//!
//! ## Test Modules
//!
//! - **posts_api_tests**: feed listing, filters, pagination, posts and comments
//! - **users_api_tests**: registration, profiles, authentication, follows
//! - **admin_api_tests**: staff-only moderation view
//! - **health_api_tests**: operational endpoints and response middleware
//! - **db_tests**: schema, constraints and on-disk databases
//! - **error_tests**: error-to-response mapping
//!
//! Run a single module with e.g. `cargo test posts_api_tests`.

pub mod db_tests;
pub mod error_tests;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use crate::middleware::auth::basic_auth_header;
use crate::models::{Comment, Post, User};
use crate::state::AppState;
use crate::store::users::NewUser;
use crate::store::{comments, posts, users};
use crate::{config, db, password};

pub(crate) const PASSWORD: &str = "correct horse battery staple";

/// Fresh state over an empty in-memory database; `overlay` is TOML layered over the defaults.
pub(crate) async fn test_state(overlay: &str) -> AppState {
    let config = config::from_toml(overlay).unwrap();
    let pool = db::connect("sqlite::memory:", 1).await.unwrap();
    db::init_db(&pool).await.unwrap();
    AppState::new(pool, config)
}

pub(crate) async fn test_app(overlay: &str) -> (Router, AppState) {
    let state = test_state(overlay).await;
    (crate::app(state.clone()), state)
}

/// Inserts a user with [`PASSWORD`] directly through the store.
pub(crate) async fn create_user(state: &AppState, username: &str) -> User {
    let hash = password::hash_password(PASSWORD).unwrap();
    let email = format!("{}@example.com", username);
    users::create(&state.db, &NewUser { username, email: &email, password_hash: &hash }).await.unwrap()
}

pub(crate) async fn create_post_at(state: &AppState, author: &User, content: &str, at: DateTime<Utc>) -> Post {
    posts::create(&state.db, author.id, content, at).await.unwrap()
}

pub(crate) async fn create_comment_at(
    state: &AppState,
    author: &User,
    post: &Post,
    content: &str,
    at: DateTime<Utc>,
) -> Comment {
    comments::create(&state.db, author.id, post.id, content, at).await.unwrap()
}

pub(crate) fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

pub(crate) fn auth(user: &User) -> String {
    basic_auth_header(&user.username, PASSWORD)
}

pub(crate) async fn send_raw(
    app: &Router,
    method: Method,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

/// Sends a request and decodes the JSON response (`Value::Null` for empty bodies).
pub(crate) async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let res = send_raw(app, method, uri, auth, body).await;
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}
