use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::AppConfig;
use crate::error::AppError;

/// Early request screening before any handler runs.
///
/// Rejects bodies whose declared `Content-Length` exceeds `limits.max_body_bytes` with 413
/// (the actual body is still capped by `DefaultBodyLimit`), and logs scanner-like user agents.
pub async fn validate_request_middleware(
    State(cfg): State<Arc<AppConfig>>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(ua_str) = req.headers().get(header::USER_AGENT).and_then(|ua| ua.to_str().ok()) {
        if is_suspicious_user_agent(ua_str) {
            tracing::warn!("Suspicious user agent detected: {}", sanitize_for_logging(ua_str));
        }
    }

    if matches!(req.method(), &Method::POST | &Method::PUT | &Method::PATCH) {
        let declared = req
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if let Some(length) = declared {
            let max_body_size = cfg.limits.max_body_bytes;
            if length > max_body_size {
                return AppError::PayloadTooLarge(format!(
                    "Request body exceeds maximum size of {} bytes",
                    max_body_size
                ))
                .into_response();
            }
        }
    }

    next.run(req).await
}

/// Check for suspicious user agents (simple heuristic)
fn is_suspicious_user_agent(ua: &str) -> bool {
    let ua_lower = ua.to_lowercase();
    ua_lower.contains("scanner")
        || (ua_lower.contains("crawler") && !ua_lower.contains("googlebot") && !ua_lower.contains("bingbot"))
        || ua_lower.contains("nikto")
        || ua_lower.contains("sqlmap")
        || ua_lower.contains("havij")
        || ua_lower.contains("acunetix")
}

/// Sanitizes user input for logging purposes.
///
/// Drops control characters (whitespace excepted), caps the length at 200 characters and
/// escapes backslashes and quotes.
pub fn sanitize_for_logging(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .take(200)
        .collect::<String>()
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\'', "\\\'")
}
