use super::ip::extract_client_ip;
use axum::{
    extract::{connect_info::ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::state::AppState;

/// Endpoint key for account registration (`POST /api/users/`).
pub const REGISTRATION_ENDPOINT: &str = "POST /api/users/";

/// A thread-safe rate limiter based on the sliding window algorithm.
#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<RwLock<HashMap<IpAddr, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_requests` per IP within `window_seconds`.
    pub fn new(max_requests: usize, window_seconds: u64) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_seconds),
        }
    }

    /// Records a request from `ip`, or returns `AppError::RateLimited` if the window is full.
    pub async fn check_rate_limit(&self, ip: IpAddr) -> Result<(), AppError> {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        let timestamps = requests.entry(ip).or_default();

        // On clock skew keep the timestamp rather than under-count
        timestamps.retain(|&t| now.checked_duration_since(t).map(|d| d < self.window).unwrap_or(true));

        if timestamps.len() >= self.max_requests {
            let oldest = timestamps.first().copied().unwrap_or(now);
            let retry_after = match now.checked_duration_since(oldest) {
                Some(elapsed) => self.window.saturating_sub(elapsed),
                None => Duration::from_secs(1),
            };
            // Round up so clients never retry a moment too early
            let retry_after_seconds = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            return Err(AppError::RateLimited { retry_after_seconds: retry_after_seconds.max(1) });
        }

        timestamps.push(now);
        Ok(())
    }

    /// Drops timestamps outside the window and forgets IPs with none left.
    pub async fn cleanup_old_entries(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        requests.retain(|_, timestamps| {
            timestamps.retain(|&t| now.checked_duration_since(t).map(|d| d < self.window).unwrap_or(true));
            !timestamps.is_empty()
        });
    }

    #[cfg(test)]
    async fn tracked_ips(&self) -> usize {
        self.requests.read().await.len()
    }
}

/// Global per-IP rate limiting for every request, backed by `AppState::rate_limiter`.
pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let remote_ip = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
    let ip = extract_client_ip(req.headers(), remote_ip, state.config.server.trust_proxy_headers);

    match state.rate_limiter.check_rate_limit(ip).await {
        Ok(()) => next.run(req).await,
        Err(e) => {
            state.metrics.inc_rate_limited();
            tracing::warn!("Rate limit exceeded for {}", ip);
            e.into_response()
        }
    }
}

/// Per-endpoint rate limiters, fixed at construction.
#[derive(Clone, Default)]
pub struct EndpointRateLimiter {
    limiters: Arc<HashMap<String, RateLimiter>>,
}

impl EndpointRateLimiter {
    /// Creates an `EndpointRateLimiter` with no limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces limits given as `(endpoint, max_requests, window_seconds)`.
    pub fn with_limits(self, limits: Vec<(&str, usize, u64)>) -> Self {
        let mut limiters_map = Arc::unwrap_or_clone(self.limiters);
        for (endpoint, max_requests, window_seconds) in limits {
            limiters_map.insert(endpoint.to_string(), RateLimiter::new(max_requests, window_seconds));
        }
        Self { limiters: Arc::new(limiters_map) }
    }

    /// Checks `ip` against the limiter for `endpoint`. Endpoints without a limit always pass.
    pub async fn check_endpoint_limit(&self, endpoint: &str, ip: IpAddr) -> Result<(), AppError> {
        match self.limiters.get(endpoint) {
            Some(limiter) => limiter.check_rate_limit(ip).await,
            None => Ok(()),
        }
    }

    /// Cleans up old entries from all endpoint-specific rate limiters.
    pub async fn cleanup_all(&self) {
        for limiter in self.limiters.values() {
            limiter.cleanup_old_entries().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter() {
        let limiter = RateLimiter::new(3, 1);
        let ip = IpAddr::from([127, 0, 0, 1]);

        assert!(limiter.check_rate_limit(ip).await.is_ok());
        assert!(limiter.check_rate_limit(ip).await.is_ok());
        assert!(limiter.check_rate_limit(ip).await.is_ok());

        match limiter.check_rate_limit(ip).await {
            Err(AppError::RateLimited { retry_after_seconds }) => assert_eq!(retry_after_seconds, 1),
            other => panic!("expected RateLimited, got {:?}", other),
        }

        // Wait for window to expire
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(limiter.check_rate_limit(ip).await.is_ok());
    }

    #[tokio::test]
    async fn test_different_ips() {
        let limiter = RateLimiter::new(1, 1);
        let ip1 = IpAddr::from([127, 0, 0, 1]);
        let ip2 = IpAddr::from([127, 0, 0, 2]);

        assert!(limiter.check_rate_limit(ip1).await.is_ok());
        assert!(limiter.check_rate_limit(ip2).await.is_ok());

        assert!(limiter.check_rate_limit(ip1).await.is_err());
        assert!(limiter.check_rate_limit(ip2).await.is_err());
    }

    #[tokio::test]
    async fn test_cleanup_forgets_idle_ips() {
        let limiter = RateLimiter::new(5, 1);
        limiter.check_rate_limit(IpAddr::from([10, 0, 0, 1])).await.unwrap();
        assert_eq!(limiter.tracked_ips().await, 1);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        limiter.cleanup_old_entries().await;
        assert_eq!(limiter.tracked_ips().await, 0);
    }

    #[tokio::test]
    async fn test_endpoint_limits_are_scoped() {
        let limiter = EndpointRateLimiter::new().with_limits(vec![(REGISTRATION_ENDPOINT, 1, 60)]);
        let ip = IpAddr::from([127, 0, 0, 1]);

        assert!(limiter.check_endpoint_limit(REGISTRATION_ENDPOINT, ip).await.is_ok());
        assert!(limiter.check_endpoint_limit(REGISTRATION_ENDPOINT, ip).await.is_err());
        // No limit configured for other endpoints
        assert!(limiter.check_endpoint_limit("GET /api/posts/", ip).await.is_ok());
    }
}
