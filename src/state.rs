use std::sync::Arc;

use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::middleware::rate_limit::{EndpointRateLimiter, RateLimiter, REGISTRATION_ENDPOINT};

/// The shared application state.
///
/// Cloned into every handler by axum. The database is the only place where domain state
/// lives; everything else here is configuration or process-local bookkeeping.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    pub db: sqlx::SqlitePool,
    /// The application configuration.
    pub config: Arc<AppConfig>,
    /// Counters exposed on `/metrics`.
    pub metrics: Metrics,
    /// Global per-IP limiter applied to every request.
    pub rate_limiter: RateLimiter,
    /// Tighter per-IP limits for individual endpoints (registration).
    pub endpoint_limiter: EndpointRateLimiter,
}

impl AppState {
    /// Creates a new `AppState` with fresh metrics and rate limiters sized from `config.rate_limit`.
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> Self {
        let rl = &config.rate_limit;
        let rate_limiter = RateLimiter::new(rl.max_requests, rl.window_seconds);
        let endpoint_limiter = EndpointRateLimiter::new().with_limits(vec![(
            REGISTRATION_ENDPOINT,
            rl.registrations_per_window,
            rl.window_seconds,
        )]);

        Self { db, config: Arc::new(config), metrics: Metrics::new(), rate_limiter, endpoint_limiter }
    }
}
