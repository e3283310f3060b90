#[cfg(test)]
mod tests {
    use crate::error::{AppError, AppResult, FieldErrors, OptionExt};
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;
    use serde_json::Value;

    async fn body_json(error: AppError) -> (StatusCode, axum::http::HeaderMap, Value) {
        let res = error.into_response();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, headers, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(AppError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Validation(FieldErrors::new()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Unauthorized("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::PayloadTooLarge("x".into()).status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(AppError::RateLimited { retry_after_seconds: 3 }.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(AppError::ServiceUnavailable("x".into()).status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(AppError::Database("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let (status, _, body) = body_json(AppError::NotFound("Post #3 not found".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({"error": "Post #3 not found"}));
    }

    #[tokio::test]
    async fn test_validation_body_lists_fields() {
        let mut fields = FieldErrors::single("email", "Invalid email format");
        fields.add("password", "This field may not be blank.");
        let (_, _, body) = body_json(AppError::Validation(fields)).await;

        assert_eq!(body["fields"]["email"][0], "Invalid email format");
        assert_eq!(body["fields"]["password"][0], "This field may not be blank.");
        assert_eq!(body["error"], "email: Invalid email format; password: This field may not be blank.");
    }

    #[tokio::test]
    async fn test_internal_errors_hide_details() {
        let (status, _, body) = body_json(AppError::Internal(anyhow::anyhow!("secret detail"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert!(uuid::Uuid::parse_str(body["error_id"].as_str().unwrap()).is_ok());
        assert!(!body.to_string().contains("secret"));

        let (_, _, body) = body_json(AppError::Database("no such table: posts".into())).await;
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_auth_and_rate_limit_headers() {
        let (_, headers, _) = body_json(AppError::Unauthorized("nope".into())).await;
        assert_eq!(headers[header::WWW_AUTHENTICATE], "Basic realm=\"plaza\"");

        let (_, headers, body) = body_json(AppError::RateLimited { retry_after_seconds: 42 }).await;
        assert_eq!(headers[header::RETRY_AFTER], "42");
        assert_eq!(body["retry_after_seconds"], 42);
    }

    #[test]
    fn test_from_sqlx_error() {
        assert!(matches!(AppError::from(sqlx::Error::RowNotFound), AppError::NotFound(_)));
        assert!(matches!(AppError::from(sqlx::Error::PoolTimedOut), AppError::ServiceUnavailable(_)));
        assert!(matches!(AppError::from(sqlx::Error::PoolClosed), AppError::Database(_)));
    }

    #[test]
    fn test_option_ext() {
        let found: AppResult<i32> = Some(42).ok_or_not_found("User 1 not found");
        assert_eq!(found.unwrap(), 42);

        let missing: AppResult<i32> = None.ok_or_not_found("User 1 not found");
        match missing.unwrap_err() {
            AppError::NotFound(msg) => assert_eq!(msg, "User 1 not found"),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_field_errors_into_result() {
        assert!(FieldErrors::new().into_result().is_ok());
        assert!(matches!(FieldErrors::single("content", "empty").into_result(), Err(AppError::Validation(_))));
    }
}
