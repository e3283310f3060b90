use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

// Health check endpoint - lightweight, no database access
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Readiness probe: checks DB connectivity with timeout protection
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let query = sqlx::query("SELECT 1").fetch_one(&state.db);
    match tokio::time::timeout(std::time::Duration::from_secs(5), query).await {
        Ok(Ok(_)) => (StatusCode::OK, "ready").into_response(),
        Ok(Err(e)) => {
            tracing::warn!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: {}", e)).into_response()
        }
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready: timeout").into_response(),
    }
}

// Metrics endpoint: returns JSON snapshot
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.get_snapshot())
}

fn counter(out: &mut String, name: &str, help: &str, kind: &str, value: u64) {
    out.push_str(&format!("# HELP plaza_{name} {help}\n# TYPE plaza_{name} {kind}\nplaza_{name} {value}\n"));
}

// Prometheus-compatible text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let m = state.metrics.get_snapshot();
    let mut body = String::new();
    counter(&mut body, "users_registered", "Users registered", "counter", m.users_registered);
    counter(&mut body, "posts_created", "Posts created", "counter", m.posts_created);
    counter(&mut body, "comments_created", "Comments created", "counter", m.comments_created);
    counter(&mut body, "follows_created", "Follow edges created", "counter", m.follows_created);
    counter(&mut body, "follows_removed", "Follow edges removed", "counter", m.follows_removed);
    counter(&mut body, "auth_failures", "Rejected credentials", "counter", m.auth_failures);
    counter(&mut body, "rate_limited", "Requests rejected by rate limiting", "counter", m.rate_limited);
    counter(&mut body, "uptime_seconds", "Uptime seconds", "gauge", m.uptime_seconds);
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// Version/Build info endpoint (JSON)
pub async fn version() -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "authors": env!("CARGO_PKG_AUTHORS"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}
