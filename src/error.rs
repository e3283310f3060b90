use std::collections::BTreeMap;
use std::fmt;

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// Field name to the list of messages explaining why it was rejected.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was collected, otherwise a validation error carrying every field.
    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// The primary error type for the application.
///
/// Every handler returns [`AppResult`]; the `IntoResponse` impl below is the single place
/// where failures are mapped to status codes and the `{"error": ...}` body.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Unexpected failures. Details are logged, never sent to the client.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
    #[error("{0}")]
    BadRequest(String),
    /// One or more request fields failed validation.
    #[error("{0}")]
    Validation(FieldErrors),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("Too many requests. Please retry after {retry_after_seconds} seconds")]
    RateLimited { retry_after_seconds: u64 },
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Internal(e) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!(%error_id, "Internal error: {:?}", e);
                json!({ "error": "Internal server error", "error_id": error_id.to_string() })
            }
            AppError::Database(msg) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!(%error_id, "Database error: {}", msg);
                json!({ "error": "Internal server error", "error_id": error_id.to_string() })
            }
            AppError::Validation(fields) => {
                tracing::warn!("Validation error: {}", fields);
                json!({ "error": fields.to_string(), "fields": fields })
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                json!({ "error": msg })
            }
            AppError::RateLimited { retry_after_seconds } => json!({
                "error": self.to_string(),
                "retry_after_seconds": retry_after_seconds,
            }),
            other => json!({ "error": other.to_string() }),
        };

        let mut res = (status, Json(body)).into_response();
        match &self {
            AppError::Unauthorized(_) => {
                res.headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic realm=\"plaza\""));
            }
            AppError::RateLimited { retry_after_seconds } => {
                res.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_seconds));
            }
            _ => {}
        }
        res
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => AppError::Database(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => {
                AppError::ServiceUnavailable("Database connection pool timed out".to_string())
            }
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        // Bodies over `DefaultBodyLimit` surface here as a buffering failure
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge(rejection.body_text());
        }
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;

/// An extension trait for `Option` that provides a convenient way to convert
/// an `Option` to a `Result` with a `NotFound` error.
pub trait OptionExt<T> {
    /// Converts `None` into `AppError::NotFound` carrying `message` verbatim.
    fn ok_or_not_found(self, message: impl Into<String>) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, message: impl Into<String>) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(message.into()))
    }
}

/// Helper functions for request validation.
pub mod validation {
    use chrono::NaiveDate;
    use validator::ValidateEmail;

    use super::*;

    pub const MAX_USERNAME_LENGTH: usize = 150;
    pub const MAX_PASSWORD_LENGTH: usize = 128;

    /// Post and comment bodies must contain something other than whitespace.
    pub fn validate_content(errors: &mut FieldErrors, value: &str, empty_message: &str) {
        if value.trim().is_empty() {
            errors.add("content", empty_message);
        }
    }

    /// Parses an integer id taken from a query string or path.
    ///
    /// Returns `Ok(None)` for an absent or empty value.
    pub fn parse_id(value: Option<&str>, field: &str) -> AppResult<Option<i64>> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            None => Ok(None),
            Some(v) => v
                .parse::<i64>()
                .map(Some)
                .map_err(|_| AppError::BadRequest(format!("Invalid {}, should be an integer", field))),
        }
    }

    /// Validates that an id is positive.
    pub fn validate_positive_id(value: i64, field: &str) -> AppResult<()> {
        if value <= 0 {
            return Err(AppError::BadRequest(format!(
                "Invalid {}. It must be a positive integer.",
                field
            )));
        }
        Ok(())
    }

    /// Parses a `YYYY-MM-DD` date. Returns `Ok(None)` for an absent or empty value.
    pub fn parse_date(value: Option<&str>, field: &str) -> AppResult<Option<NaiveDate>> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            None => Ok(None),
            Some(v) => {
                let reject = |reason: &dyn fmt::Display| {
                    tracing::warn!(
                        "Rejected {} '{}': {}",
                        field,
                        crate::middleware::validation::sanitize_for_logging(v),
                        reason
                    );
                    AppError::BadRequest(format!("Invalid {} format, should be YYYY-MM-DD", field))
                };
                // `%Y` alone would also take signed and five-digit years
                if !is_plain_iso_date(v) {
                    return Err(reject(&"not in YYYY-MM-DD form"));
                }
                NaiveDate::parse_from_str(v, "%Y-%m-%d").map(Some).map_err(|e| reject(&e))
            }
        }
    }

    /// Exactly four, two and two ASCII digits separated by dashes.
    fn is_plain_iso_date(value: &str) -> bool {
        let bytes = value.as_bytes();
        bytes.len() == 10
            && bytes.iter().enumerate().all(|(i, b)| match i {
                4 | 7 => *b == b'-',
                _ => b.is_ascii_digit(),
            })
    }

    pub fn validate_username(errors: &mut FieldErrors, username: &str) {
        if username.is_empty() {
            errors.add("username", "This field may not be blank.");
            return;
        }
        if username.chars().count() > MAX_USERNAME_LENGTH {
            errors.add(
                "username",
                format!("Ensure this field has no more than {} characters.", MAX_USERNAME_LENGTH),
            );
        }
        let allowed = |c: char| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-');
        if !username.chars().all(allowed) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }
    }

    pub fn validate_email(errors: &mut FieldErrors, email: &str) {
        if !email.validate_email() {
            errors.add("email", "Invalid email format");
        }
    }

    pub fn validate_password(errors: &mut FieldErrors, password: &str) {
        if password.is_empty() {
            errors.add("password", "This field may not be blank.");
        } else if password.chars().count() > MAX_PASSWORD_LENGTH {
            errors.add(
                "password",
                format!("Ensure this field has no more than {} characters.", MAX_PASSWORD_LENGTH),
            );
        }
    }

}
