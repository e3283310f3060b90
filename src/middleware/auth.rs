//! HTTP Basic authentication against stored Argon2 hashes.
//!
//! Handlers opt in by taking [`AuthUser`] (credentials required) or [`MaybeAuthUser`]
//! (anonymous allowed) as a parameter; the authenticated user is then an explicit argument
//! rather than ambient request state.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{AppError, AppResult};
use crate::middleware::validation::sanitize_for_logging;
use crate::models::User;
use crate::password;
use crate::state::AppState;
use crate::store::users;

pub const NO_CREDENTIALS: &str = "Authentication credentials were not provided.";
pub const BAD_CREDENTIALS: &str = "Invalid username/password.";
const BAD_HEADER: &str = "Invalid basic header. Credentials not correctly base64 encoded.";

/// The user behind a request with valid Basic credentials.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// Like [`AuthUser`], but `None` for requests without an `Authorization` header.
/// Credentials that are present but wrong still reject with 401.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<User>);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match authenticate(parts, state).await? {
            Some(user) => Ok(AuthUser(user)),
            None => Err(AppError::Unauthorized(NO_CREDENTIALS.to_string())),
        }
    }
}

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(authenticate(parts, state).await?))
    }
}

/// Builds an `Authorization` header value for the given credentials.
pub fn basic_auth_header(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

/// Splits `Basic <base64(username:password)>` into its parts.
fn parse_basic(value: &str) -> AppResult<(String, String)> {
    let bad_header = || AppError::Unauthorized(BAD_HEADER.to_string());

    let (scheme, encoded) = value.trim().split_once(' ').ok_or_else(bad_header)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(AppError::Unauthorized(format!("Unsupported authorization scheme: {}", sanitize_for_logging(scheme))));
    }
    let decoded = STANDARD.decode(encoded.trim()).map_err(|_| bad_header())?;
    let text = String::from_utf8(decoded).map_err(|_| bad_header())?;
    let (username, password) = text.split_once(':').ok_or_else(bad_header)?;
    Ok((username.to_string(), password.to_string()))
}

async fn authenticate(parts: &Parts, state: &AppState) -> AppResult<Option<User>> {
    let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| AppError::Unauthorized(BAD_HEADER.to_string()))?;
    let (username, password) = parse_basic(value)?;

    let user = match users::find_by_username(&state.db, &username).await? {
        Some(user) => user,
        None => {
            state.metrics.inc_auth_failures();
            tracing::warn!("Authentication failed: unknown user '{}'", sanitize_for_logging(&username));
            return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
        }
    };

    if !password::verify_blocking(password, user.password_hash.clone()).await? {
        state.metrics.inc_auth_failures();
        tracing::warn!("Authentication failed: wrong password for user {}", user.id);
        return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
    }

    Ok(Some(user))
}
